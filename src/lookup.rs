//! Keyword search across the HDUs of a file.
//!
//! A lookup first tries the keyword as given, then its HIERARCH long form
//! (`HIERARCH <prefix> <KEY>`), and, when no unit was requested explicitly,
//! moves on to the next HDU and starts over.

use crate::fits::Hdu;
use crate::header::{normalize_keyword, Card};

/// Vendor tag used for HIERARCH long-form keywords by default
pub const DEFAULT_HIERARCH_PREFIX: &str = "ESO";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found { unit: usize, card: &'a Card },
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn card(&self) -> Option<&'a Card> {
        match self {
            Lookup::Found { card, .. } => Some(card),
            Lookup::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Short(usize),
    Long(usize),
    Advance(usize),
}

#[derive(Debug, Clone)]
pub struct KeySearch {
    short: String,
    long: Option<String>,
    start: usize,
    explicit_unit: bool,
}

impl KeySearch {
    /// `unit` is the explicitly requested HDU, if any. Without one the
    /// search starts at the primary HDU and may advance.
    pub fn new(keyword: &str, unit: Option<usize>, hierarch_prefix: &str) -> Self {
        let short = normalize_keyword(keyword);
        let long = if short.starts_with("HIERARCH ") || short == "HIERARCH" {
            None
        } else {
            Some(normalize_keyword(&format!(
                "HIERARCH {} {}",
                hierarch_prefix, short
            )))
        };

        Self {
            short,
            long,
            start: unit.unwrap_or(0),
            explicit_unit: unit.is_some(),
        }
    }

    pub fn run<'a>(&self, hdus: &'a [Hdu]) -> Lookup<'a> {
        let mut step = Step::Short(self.start);
        loop {
            step = match step {
                Step::Short(unit) => {
                    let Some(hdu) = hdus.get(unit) else {
                        return Lookup::NotFound;
                    };
                    match hdu.header.get(&self.short) {
                        Some(card) => return Lookup::Found { unit, card },
                        None => Step::Long(unit),
                    }
                }
                Step::Long(unit) => {
                    let hit = self
                        .long
                        .as_deref()
                        .and_then(|long| hdus[unit].header.get(long));
                    match hit {
                        Some(card) => return Lookup::Found { unit, card },
                        None => Step::Advance(unit),
                    }
                }
                Step::Advance(unit) => {
                    if self.explicit_unit || unit + 1 >= hdus.len() {
                        return Lookup::NotFound;
                    }
                    tracing::debug!("{} not in HDU {}, trying HDU {}", self.short, unit, unit + 1);
                    Step::Short(unit + 1)
                }
            };
        }
    }
}
