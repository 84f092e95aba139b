use crate::fits::{copy_uncompressed, FitsFile, PrimaryHeaderEditor};
use crate::header::{Card, Header};
use crate::utils::merged_output_path;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Keywords describing the data layout, which is copied unchanged
const STRUCTURAL_KEYWORDS: [&str; 8] = [
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "GROUPS",
];

pub fn is_structural(keyword: &str) -> bool {
    if STRUCTURAL_KEYWORDS.contains(&keyword) || keyword == "END" {
        return true;
    }
    // NAXIS1, NAXIS2, ...
    keyword
        .strip_prefix("NAXIS")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Insert-or-overwrite every card of `cards` onto `target`, skipping
/// structural keywords and commentary cards `target` already has. Returns
/// the cards that changed `target`, in order.
pub fn apply_header(target: &mut Header, cards: &Header) -> Vec<Card> {
    let mut applied = Vec::new();
    for card in cards.cards() {
        if card.is_commentary() {
            if target.cards().contains(card) {
                tracing::debug!("{} card already present: {:?}", card.keyword, card.comment);
                continue;
            }
        } else if is_structural(&card.keyword) {
            tracing::warn!("Skipping structural keyword {}", card.keyword);
            continue;
        }
        target.set(card.clone());
        applied.push(card.clone());
    }
    applied
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn write_cards(output: &Path, cards: &[Card]) -> Result<()> {
    let mut editor = PrimaryHeaderEditor::open(output)?;
    for card in cards {
        editor.write(card)?;
    }
    editor.flush()?;
    Ok(())
}

/// Merge a text header into the primary header of a copy of `fits_path`.
/// Returns the path written.
pub fn merge_header(
    header_text: &Path,
    fits_path: &Path,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let text = fs::read_to_string(header_text)
        .with_context(|| format!("Failed to read header text: {}", header_text.display()))?;
    let cards = Header::parse_text(&text)
        .with_context(|| format!("Failed to parse header text: {}", header_text.display()))?;

    let fits = FitsFile::open(fits_path)
        .with_context(|| format!("Failed to open FITS file: {}", fits_path.display()))?;

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => merged_output_path(fits_path),
    };
    if same_file(&output, fits_path) {
        bail!(
            "Refusing to overwrite the input file {}",
            fits_path.display()
        );
    }

    let mut primary = fits
        .hdus
        .first()
        .map(|hdu| hdu.header.clone())
        .with_context(|| format!("{} has no primary HDU", fits_path.display()))?;
    let updates = apply_header(&mut primary, &cards);
    for card in &updates {
        card.check_width()
            .with_context(|| format!("Failed to parse header text: {}", header_text.display()))?;
    }
    tracing::info!(
        "Applying {} of {} cards to the primary header of {}",
        updates.len(),
        cards.len(),
        fits_path.display()
    );

    copy_uncompressed(fits_path, &output)
        .with_context(|| format!("Failed to copy {} to {}", fits_path.display(), output.display()))?;
    if let Err(err) = write_cards(&output, &updates) {
        // leave no partially edited copy behind
        let _ = fs::remove_file(&output);
        return Err(err.context(format!("Failed to write FITS file: {}", output.display())));
    }

    println!("Wrote {}", output.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::fixtures::{bintable_ext, pixels, primary, write};
    use crate::header::Value;
    use fitsio::FitsFile as FitsHandle;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use indoc::indoc;
    use std::io::Write;

    const HEADER_TEXT: &str = indoc! {"
        OBJECT  = 'NGC 253 '           / target name
        EXPTIME = 600.0 / seconds
        NAXIS1  = 999
        HISTORY header merged
        END
    "};

    fn setup(dir: &Path) -> (PathBuf, PathBuf) {
        let fits = write(
            dir,
            "night.fits",
            vec![
                primary(vec![
                    Card::new("OBJECT", Value::Str("unknown".into()), None),
                    Card::new("FILTER", Value::Str("R".into()), None),
                ]),
                bintable_ext("EVENTS"),
            ],
        );
        let text = dir.join("header.txt");
        fs::write(&text, HEADER_TEXT).unwrap();
        (text, fits)
    }

    fn primary_pixels(path: &Path) -> Vec<f32> {
        let mut fptr = FitsHandle::open(path).unwrap();
        let hdu = fptr.hdu(0).unwrap();
        hdu.read_image(&mut fptr).unwrap()
    }

    #[test]
    fn test_is_structural() {
        for keyword in ["SIMPLE", "BITPIX", "NAXIS", "NAXIS2", "NAXIS999", "END", "GROUPS"] {
            assert!(is_structural(keyword), "{}", keyword);
        }
        for keyword in ["NAXISX", "OBJECT", "EXPTIME", "HIERARCH ESO NAXIS1"] {
            assert!(!is_structural(keyword), "{}", keyword);
        }
    }

    #[test]
    fn test_apply_header_skips_known_commentary() {
        let mut target = Header::from_cards(vec![
            Card::new("OBJECT", Value::Str("M31".into()), None),
            Card::commentary("HISTORY", "flat fielded"),
        ]);
        let cards = Header::from_cards(vec![
            Card::commentary("HISTORY", "flat fielded"),
            Card::new("BITPIX", Value::Int(-32), None),
            Card::new("OBJECT", Value::Str("M33".into()), None),
            Card::commentary("HISTORY", "merged"),
        ]);

        let applied = apply_header(&mut target, &cards);
        assert_eq!(applied, vec![cards.cards()[2].clone(), cards.cards()[3].clone()]);
        assert_eq!(target.string("OBJECT"), Some("M33"));
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn test_merge_updates_primary_only() {
        let dir = tempfile::tempdir().unwrap();
        let (text, fits_path) = setup(dir.path());

        let output = merge_header(&text, &fits_path, None).unwrap();
        assert_eq!(output, dir.path().join("night_hdr.fits"));

        let before = FitsFile::open(&fits_path).unwrap();
        let after = FitsFile::open(&output).unwrap();
        let header = &after.hdus[0].header;

        assert_eq!(header.string("OBJECT"), Some("NGC 253"));
        assert_eq!(header.get("OBJECT").unwrap().comment.as_deref(), Some("target name"));
        assert_eq!(header.value("EXPTIME"), Some(&Value::Float(600.0)));
        assert_eq!(header.string("FILTER"), Some("R"));
        // structural keywords are never taken from the text header
        assert_eq!(header.int("NAXIS1"), Some(3));

        // OBJECT keeps its position, new keys are appended
        let keys: Vec<_> = header.cards().iter().map(|c| c.keyword.as_str()).collect();
        let position = |k: &str| keys.iter().position(|&key| key == k).unwrap();
        assert!(position("OBJECT") < position("FILTER"));
        assert_eq!(keys[keys.len() - 2..], ["EXPTIME", "HISTORY"]);
        assert_eq!(header.cards().last().unwrap().comment.as_deref(), Some("header merged"));

        assert_eq!(primary_pixels(&output), pixels(&before.hdus[0]));
        assert_eq!(after.hdus[1], before.hdus[1]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (text, fits_path) = setup(dir.path());

        let once = merge_header(&text, &fits_path, None).unwrap();
        let twice_path = dir.path().join("twice.fits");
        let twice = merge_header(&text, &once, Some(&twice_path)).unwrap();

        let once = FitsFile::open(&once).unwrap();
        let twice = FitsFile::open(&twice).unwrap();
        assert_eq!(once.hdus, twice.hdus);
    }

    #[test]
    fn test_merge_long_string_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let (text, fits_path) = setup(dir.path());
        let note = "x".repeat(75);
        fs::write(&text, format!("OBSNOTE = '{}'\nEND\n", note)).unwrap();

        let output = merge_header(&text, &fits_path, None).unwrap();
        let merged = FitsFile::open(&output).unwrap();
        assert_eq!(merged.hdus[0].header.long_string("OBSNOTE"), Some(note));
        assert_eq!(merged.hdus.len(), 2);
    }

    #[test]
    fn test_over_wide_card_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (text, fits_path) = setup(dir.path());
        let long_name = "DETECTOR ".repeat(8);
        fs::write(
            &text,
            format!("OBJECT = 'M1'\nHIERARCH ESO {}= 1.5\nEND\n", long_name),
        )
        .unwrap();

        let err = merge_header(&text, &fits_path, None).unwrap_err();
        assert!(format!("{:#}", err).contains("more than fit in one card"));
        assert!(!dir.path().join("night_hdr.fits").exists());
    }

    #[test]
    fn test_merge_gzipped_input() {
        let dir = tempfile::tempdir().unwrap();
        let (text, fits_path) = setup(dir.path());
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&fs::read(&fits_path).unwrap()).unwrap();
        let gz_path = dir.path().join("night.fits.gz");
        fs::write(&gz_path, encoder.finish().unwrap()).unwrap();

        let output = merge_header(&text, &gz_path, None).unwrap();
        assert_eq!(output, dir.path().join("night_hdr.fits"));
        let merged = FitsFile::open(&output).unwrap();
        assert_eq!(merged.hdus[0].header.string("OBJECT"), Some("NGC 253"));
    }

    #[test]
    fn test_refuses_to_overwrite_input() {
        let dir = tempfile::tempdir().unwrap();
        let (text, fits_path) = setup(dir.path());
        let err = merge_header(&text, &fits_path, Some(&fits_path)).unwrap_err();
        assert!(err.to_string().contains("Refusing to overwrite"));
    }

    #[test]
    fn test_bad_header_text() {
        let dir = tempfile::tempdir().unwrap();
        let (text, fits_path) = setup(dir.path());
        fs::write(&text, "OBJECT  = 'unterminated\nEND\n").unwrap();

        let err = merge_header(&text, &fits_path, None).unwrap_err();
        assert!(format!("{:#}", err).contains("unterminated string"));
        assert!(!dir.path().join("night_hdr.fits").exists());
    }
}
