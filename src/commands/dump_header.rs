use crate::fits::FitsFile;
use crate::header::Value;
use crate::lookup::{KeySearch, Lookup, DEFAULT_HIERARCH_PREFIX};
use crate::utils::display_name;
use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Cell printed for a keyword that is in none of the searched units
pub const NOT_FOUND: &str = "-";

#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Explicit unit; disables advancing to later units
    pub ext: Option<usize>,
    /// Print every unit's header (full dumps only)
    pub all: bool,
    /// Pad columns to a common width
    pub align: bool,
    pub full_path: bool,
    pub hierarch_prefix: String,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            ext: None,
            all: false,
            align: false,
            full_path: false,
            hierarch_prefix: DEFAULT_HIERARCH_PREFIX.to_string(),
        }
    }
}

pub fn dump_header<W: Write>(
    out: &mut W,
    files: &[PathBuf],
    keywords: &[String],
    options: &DumpOptions,
) -> Result<()> {
    if keywords.is_empty() {
        print_headers(out, files, options)
    } else {
        let rows = collect_rows(files, keywords, options)?;
        write!(out, "{}", format_rows(&rows, options.align))?;
        Ok(())
    }
}

fn open(path: &Path, ext: Option<usize>) -> Result<FitsFile> {
    let fits = FitsFile::open(path)
        .with_context(|| format!("Failed to read FITS file: {}", path.display()))?;
    if let Some(ext) = ext {
        if ext >= fits.hdus.len() {
            bail!(
                "{} has {} HDU(s), there is no HDU {}",
                path.display(),
                fits.hdus.len(),
                ext
            );
        }
    }
    Ok(fits)
}

fn print_headers<W: Write>(out: &mut W, files: &[PathBuf], options: &DumpOptions) -> Result<()> {
    let banners = files.len() > 1 || options.all;
    let mut first = true;

    for path in files {
        let fits = open(path, options.ext)?;
        let units: Vec<usize> = if options.all {
            (0..fits.hdus.len()).collect()
        } else {
            vec![options.ext.unwrap_or(0)]
        };

        for unit in units {
            if banners {
                if !first {
                    writeln!(out)?;
                }
                writeln!(
                    out,
                    "==> {}[{}] <==",
                    display_name(path, options.full_path),
                    unit
                )?;
            }
            first = false;
            write!(out, "{}", fits.hdus[unit].header.to_text())?;
        }
    }
    Ok(())
}

/// One row per file: the file name followed by one cell per keyword
pub fn collect_rows(
    files: &[PathBuf],
    keywords: &[String],
    options: &DumpOptions,
) -> Result<Vec<Vec<String>>> {
    let searches: Vec<KeySearch> = keywords
        .iter()
        .map(|k| KeySearch::new(k, options.ext, &options.hierarch_prefix))
        .collect();

    let mut rows = Vec::with_capacity(files.len());
    for path in files {
        let fits = open(path, options.ext)?;
        let mut row = Vec::with_capacity(keywords.len() + 1);
        row.push(display_name(path, options.full_path));

        for (keyword, search) in keywords.iter().zip(&searches) {
            let cell = match search.run(&fits.hdus) {
                Lookup::Found { unit, card } => {
                    tracing::debug!("{}: {} found in HDU {}", path.display(), keyword, unit);
                    let text = match &card.value {
                        Some(Value::Str(_)) => fits.hdus[unit]
                            .header
                            .long_string(&card.keyword)
                            .unwrap_or_default(),
                        Some(value) => value.to_string(),
                        None => card.comment.clone().unwrap_or_default(),
                    };
                    if text.is_empty() {
                        "''".to_string()
                    } else {
                        text
                    }
                }
                Lookup::NotFound => NOT_FOUND.to_string(),
            };
            row.push(cell);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Join cells with single spaces. When aligning, every column but the last
/// is padded to its widest cell.
pub fn format_rows(rows: &[Vec<String>], align: bool) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    if align {
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();
    for row in rows {
        let last = row.len().saturating_sub(1);
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if align && i < last {
                    format!("{:<width$}", cell, width = widths[i])
                } else {
                    cell.clone()
                }
            })
            .collect();
        output.push_str(&line.join(" "));
        output.push('\n');
    }
    output
}
