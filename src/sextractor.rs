//! Reader for SExtractor ASCII_HEAD catalogues.
//!
//! The header is a block of comment lines, one per output parameter:
//!
//! ```text
//! #   1 NUMBER                 Running object number
//! #   2 X_IMAGE                Object position along x                   [pixel]
//! #   4 FLUX_APER              Flux vector within fixed circular aperture(s) [count]
//! #   7 A_IMAGE                Profile RMS along major axis              [pixel]
//! ```
//!
//! Column numbers are 1-based. A gap between two numbers means the first
//! parameter is a vector spanning the gap (FLUX_APER above has 3 elements).

use crate::error::CatalogueError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static COLUMN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s*(\d+)\s+([A-Za-z0-9_.\-]+)\s*(.*?)\s*(?:\[([^\]]*)\])?\s*$").unwrap()
});

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// 0-based position of the first element
    pub index: usize,
    /// Number of elements; vector parameters span several fields
    pub width: usize,
    pub description: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    columns: Vec<Column>,
    rows: Vec<Vec<f64>>,
}

impl Catalogue {
    pub fn read(path: &Path) -> Result<Self, CatalogueError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, CatalogueError> {
        let mut columns: Vec<Column> = Vec::new();
        let mut rows = Vec::new();
        let mut min_fields = 0;

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with('#') {
                if let Some(caps) = COLUMN_LINE.captures(trimmed) {
                    let number: usize = caps[1].parse().unwrap_or(0);
                    if number == 0 {
                        continue;
                    }
                    columns.push(Column {
                        name: caps[2].to_string(),
                        index: number - 1,
                        width: 1,
                        description: caps[3].to_string(),
                        unit: caps.get(4).map(|m| m.as_str().to_string()),
                    });
                }
                continue;
            }

            if columns.is_empty() {
                return Err(CatalogueError::NoColumns);
            }
            if min_fields == 0 {
                min_fields = finish_columns(&mut columns);
            }

            let fields = trimmed
                .split_whitespace()
                .map(|field| {
                    field.parse::<f64>().map_err(|_| CatalogueError::BadNumber {
                        line: line_no,
                        value: field.to_string(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;

            if fields.len() < min_fields {
                return Err(CatalogueError::ShortRow {
                    line: line_no,
                    expected: min_fields,
                    found: fields.len(),
                });
            }
            rows.push(fields);
        }

        if columns.is_empty() {
            return Err(CatalogueError::NoColumns);
        }
        if min_fields == 0 {
            finish_columns(&mut columns);
        }

        // The last parameter may be a vector; the rows tell how wide.
        if let (Some(last), Some(first_row)) = (columns.last_mut(), rows.first()) {
            last.width = first_row.len().saturating_sub(last.index).max(1);
        }

        tracing::debug!(
            "Catalogue has {} columns and {} rows",
            columns.len(),
            rows.len()
        );
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.column(name).is_some())
    }

    /// First element of a named parameter in a row
    pub fn value(&self, row: &[f64], name: &str) -> Option<f64> {
        self.column(name).and_then(|c| row.get(c.index).copied())
    }
}

/// Sort by position and derive vector widths from the gaps between
/// successive column numbers. Returns the minimum number of fields a row
/// must have.
fn finish_columns(columns: &mut [Column]) -> usize {
    columns.sort_by_key(|c| c.index);
    for i in 0..columns.len().saturating_sub(1) {
        columns[i].width = (columns[i + 1].index - columns[i].index).max(1);
    }
    columns.last().map(|c| c.index + 1).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const CATALOGUE: &str = indoc! {"
        #   1 NUMBER                 Running object number
        #   2 X_IMAGE                Object position along x                                    [pixel]
        #   3 Y_IMAGE                Object position along y                                    [pixel]
        #   4 FLUX_APER              Flux vector within fixed circular aperture(s)              [count]
        #   7 A_IMAGE                Profile RMS along major axis                               [pixel]
        #   8 B_IMAGE                Profile RMS along minor axis                               [pixel]
        #   9 THETA_IMAGE            Position angle (CCW/x)                                     [deg]
                 1    100.000    200.000   10.1   20.2   30.3     5.000    2.000   30.00
                 2     12.500     40.250   1e3    2e3    3e3      1.250    1.000  -45.00

    "};

    #[test]
    fn test_parse_columns() {
        let cat = Catalogue::parse(CATALOGUE).unwrap();
        assert_eq!(cat.columns().len(), 7);

        let x = cat.column("X_IMAGE").unwrap();
        assert_eq!(x.index, 1);
        assert_eq!(x.width, 1);
        assert_eq!(x.unit.as_deref(), Some("pixel"));
        assert_eq!(x.description, "Object position along x");

        let flux = cat.column("flux_aper").unwrap();
        assert_eq!(flux.index, 3);
        assert_eq!(flux.width, 3);

        assert_eq!(cat.column("THETA_IMAGE").unwrap().width, 1);
    }

    #[test]
    fn test_parse_rows() {
        let cat = Catalogue::parse(CATALOGUE).unwrap();
        assert_eq!(cat.len(), 2);
        let row = &cat.rows()[1];
        assert_eq!(cat.value(row, "NUMBER"), Some(2.0));
        assert_eq!(cat.value(row, "Y_IMAGE"), Some(40.25));
        assert_eq!(cat.value(row, "FLUX_APER"), Some(1000.0));
        assert_eq!(cat.value(row, "THETA_IMAGE"), Some(-45.0));
        assert_eq!(cat.value(row, "MAG_AUTO"), None);
        assert!(cat.has_columns(&["A_IMAGE", "B_IMAGE", "THETA_IMAGE"]));
    }

    #[test]
    fn test_header_only_catalogue() {
        let cat = Catalogue::parse("#   1 X_IMAGE  x\n#   2 Y_IMAGE  y\n").unwrap();
        assert!(cat.is_empty());
        assert_eq!(cat.columns().len(), 2);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Catalogue::parse("1 2 3\n"),
            Err(CatalogueError::NoColumns)
        ));
        assert!(matches!(
            Catalogue::parse(""),
            Err(CatalogueError::NoColumns)
        ));

        let short = "#   1 X_IMAGE\n#   2 Y_IMAGE\n#   3 A_IMAGE\n1.0 2.0\n";
        assert!(matches!(
            Catalogue::parse(short),
            Err(CatalogueError::ShortRow {
                line: 4,
                expected: 3,
                found: 2
            })
        ));

        let bad = "#   1 X_IMAGE\n#   2 Y_IMAGE\n1.0 abc\n";
        assert!(matches!(
            Catalogue::parse(bad),
            Err(CatalogueError::BadNumber { line: 3, .. })
        ));
    }
}
