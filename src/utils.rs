use std::path::{Path, PathBuf};

/// Suffixes recognised as FITS files, longest first
pub const FITS_SUFFIXES: [&str; 6] = [
    ".fits.gz", ".fit.gz", ".fts.gz", ".fits", ".fit", ".fts",
];

/// Suffix appended to the stem of header-merged files
pub const MERGED_SUFFIX: &str = "_hdr.fits";

fn matching_suffix<'a>(name: &str, suffixes: &[&'a str]) -> Option<&'a str> {
    let lower = name.to_lowercase();
    suffixes.iter().copied().find(|s| lower.ends_with(s))
}

pub fn is_fits_path(arg: &str) -> bool {
    matching_suffix(arg, &FITS_SUFFIXES).is_some()
}

/// Name shown in output: the path as given, or just the file name
pub fn display_name(path: &Path, full_path: bool) -> String {
    if full_path {
        return path.display().to_string();
    }
    let text = path.to_string_lossy();
    text.split(&['\\', '/'][..])
        .next_back()
        .unwrap_or(&*text)
        .to_string()
}

/// Replace the first matching suffix at the end of the file name only.
/// A file name without any of the suffixes gets `replacement` appended.
pub fn replace_suffix(path: &Path, suffixes: &[&str], replacement: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = match matching_suffix(&name, suffixes) {
        Some(suffix) => &name[..name.len() - suffix.len()],
        None => name.as_str(),
    };
    path.with_file_name(format!("{}{}", stem, replacement))
}

/// Output name for a header-merged copy of `input`
pub fn merged_output_path(input: &Path) -> PathBuf {
    replace_suffix(input, &FITS_SUFFIXES, MERGED_SUFFIX)
}

/// Output name for the region file converted from a catalogue
pub fn region_output_path(catalogue: &Path) -> PathBuf {
    replace_suffix(catalogue, &[".cat"], ".reg")
}
