use crate::fits::{format_summary_table, FitsFile, HduSummary};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, serde::Serialize)]
pub struct FileSummary {
    pub filename: String,
    pub hdus: Vec<HduSummary>,
}

pub fn summarize(path: &Path) -> Result<FileSummary> {
    let fits = FitsFile::open(path)
        .with_context(|| format!("Failed to open FITS file: {}", path.display()))?;
    Ok(FileSummary {
        filename: path.display().to_string(),
        hdus: fits.summaries(),
    })
}

/// Summarise each file in turn. The first unreadable file aborts the run.
pub fn print_info<W: Write>(out: &mut W, files: &[PathBuf], json: bool) -> Result<()> {
    if json {
        let summaries = files
            .iter()
            .map(|path| summarize(path))
            .collect::<Result<Vec<_>>>()?;
        writeln!(out, "{}", serde_json::to_string_pretty(&summaries)?)?;
        return Ok(());
    }

    for (index, path) in files.iter().enumerate() {
        let summary = summarize(path)?;
        if index > 0 {
            writeln!(out)?;
        }
        write!(out, "{}", format_summary_table(&summary.filename, &summary.hdus))?;
    }
    Ok(())
}
