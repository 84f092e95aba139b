//! Errors raised while reading headers, FITS files and catalogues.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Line {line}: unterminated string value in card '{card}'")]
    UnterminatedString { line: usize, card: String },

    #[error("Line {line}: invalid keyword '{keyword}'")]
    InvalidKeyword { line: usize, keyword: String },

    #[error("Card {keyword} needs {width} columns, more than fit in one card")]
    CardTooLong { keyword: String, width: usize },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum FitsError {
    #[error("Couldn't open {file}: {source}")]
    Open {
        file: String,
        source: Box<fitsio::errors::Error>,
    },

    #[error("{file}: {action}: {source}")]
    Fitsio {
        file: String,
        action: String,
        source: Box<fitsio::errors::Error>,
    },

    #[error("{file}: HDU {hdu} has invalid header card: {source}")]
    Card {
        file: String,
        hdu: usize,
        source: HeaderError,
    },

    #[error("{file}: card {keyword} contains a NUL byte")]
    NulByte { file: String, keyword: String },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("Catalogue has no column header lines")]
    NoColumns,

    #[error("Catalogue has neither X_IMAGE/Y_IMAGE nor XWIN_IMAGE/YWIN_IMAGE position columns")]
    NoPositionColumns,

    #[error("Line {line}: expected at least {expected} fields, found {found}")]
    ShortRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: could not parse '{value}' as a number")]
    BadNumber { line: usize, value: String },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
