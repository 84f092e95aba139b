use crate::region::{regions_from_catalogue, write_regions, RegionOptions};
use crate::sextractor::Catalogue;
use crate::utils::region_output_path;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Convert a SExtractor catalogue into a DS9 region file. Returns the path
/// written.
pub fn sex_to_region(
    catalogue_path: &Path,
    output: Option<&Path>,
    colour: &str,
    options: &RegionOptions,
) -> Result<PathBuf> {
    let catalogue = Catalogue::read(catalogue_path)
        .with_context(|| format!("Failed to read catalogue: {}", catalogue_path.display()))?;
    let regions = regions_from_catalogue(&catalogue, options)
        .with_context(|| format!("Failed to convert catalogue: {}", catalogue_path.display()))?;

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => region_output_path(catalogue_path),
    };

    let file = File::create(&output)
        .with_context(|| format!("Failed to create region file: {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    write_regions(&mut writer, &regions, colour)?;
    writer.flush()?;

    println!("Wrote {} regions to {}", regions.len(), output.display());
    Ok(output)
}
