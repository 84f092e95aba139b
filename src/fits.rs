//! Header-level FITS file access on top of cfitsio.
//!
//! Files are opened with `fitsio` and every header record of every HDU is
//! read back as a [`Card`]. Data units are never decoded; cfitsio keeps
//! track of where they are, and header edits are made in place so the data
//! stays untouched.

use crate::error::{FitsError, HeaderError};
use crate::header::{Card, Header, Value, CARD_LEN};
use fitsio::errors::check_status as fits_check_status;
use fitsio::FitsFile as FitsHandle;
use flate2::read::GzDecoder;
use std::ffi::{c_char, c_int, CStr, CString};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HduKind {
    Primary,
    Groups,
    Image,
    BinTable,
    Table,
    Other(String),
}

impl fmt::Display for HduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HduKind::Primary => write!(f, "PrimaryHDU"),
            HduKind::Groups => write!(f, "GroupsHDU"),
            HduKind::Image => write!(f, "ImageHDU"),
            HduKind::BinTable => write!(f, "BinTableHDU"),
            HduKind::Table => write!(f, "TableHDU"),
            HduKind::Other(xtension) => write!(f, "{}", xtension),
        }
    }
}

/// One header and data unit. Only the header is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Hdu {
    pub header: Header,
}

impl Hdu {
    pub fn new(header: Header) -> Self {
        Self { header }
    }

    pub fn kind(&self) -> HduKind {
        if self.header.get("SIMPLE").is_some() {
            return if self.header.logical("GROUPS") == Some(true) {
                HduKind::Groups
            } else {
                HduKind::Primary
            };
        }

        let xtension = self
            .header
            .string("XTENSION")
            .unwrap_or("")
            .trim()
            .to_uppercase();
        match xtension.as_str() {
            "IMAGE" => HduKind::Image,
            "BINTABLE" => HduKind::BinTable,
            "TABLE" => HduKind::Table,
            _ => HduKind::Other(xtension),
        }
    }

    /// EXTNAME, or PRIMARY for the primary HDU
    pub fn name(&self) -> String {
        match self.header.string("EXTNAME") {
            Some(name) => name.to_string(),
            None if matches!(self.kind(), HduKind::Primary | HduKind::Groups) => {
                "PRIMARY".to_string()
            }
            None => String::new(),
        }
    }

    /// NAXIS1..NAXISn, in FITS order
    pub fn axes(&self) -> Vec<i64> {
        let naxis = self.header.int("NAXIS").unwrap_or(0);
        (1..=naxis)
            .map(|n| self.header.int(&format!("NAXIS{}", n)).unwrap_or(0))
            .collect()
    }

    pub fn summary(&self, index: usize) -> HduSummary {
        let kind = self.kind();
        let (dimensions, format) = match kind {
            HduKind::BinTable | HduKind::Table => {
                let rows = self.header.int("NAXIS2").unwrap_or(0);
                let fields = self.header.int("TFIELDS").unwrap_or(0);
                let forms: Vec<String> = (1..=fields)
                    .map(|n| {
                        self.header
                            .string(&format!("TFORM{}", n))
                            .unwrap_or("")
                            .trim()
                            .to_string()
                    })
                    .collect();
                (
                    format!("{}R x {}C", rows, fields),
                    format!("[{}]", forms.join(", ")),
                )
            }
            _ => {
                let axes: Vec<String> = self.axes().iter().map(|a| a.to_string()).collect();
                let format = self
                    .header
                    .int("BITPIX")
                    .map(bitpix_format)
                    .unwrap_or_default();
                (format!("({})", axes.join(", ")), format)
            }
        };

        HduSummary {
            index,
            name: self.name(),
            kind: kind.to_string(),
            cards: self.header.len(),
            dimensions,
            format,
        }
    }
}

fn bitpix_format(bitpix: i64) -> String {
    match bitpix {
        8 => "uint8",
        16 => "int16",
        32 => "int32",
        64 => "int64",
        -32 => "float32",
        -64 => "float64",
        _ => "unknown",
    }
    .to_string()
}

/// Summary row for one HDU
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HduSummary {
    pub index: usize,
    pub name: String,
    pub kind: String,
    pub cards: usize,
    pub dimensions: String,
    pub format: String,
}

/// Format a file's HDU summaries as a table
pub fn format_summary_table(filename: &str, summaries: &[HduSummary]) -> String {
    let mut output = String::new();
    output.push_str(&format!("Filename: {}\n", filename));
    output.push_str(&format!(
        "{:<4}  {:<10} {:<12} {:>5}   {:<14} {}\n",
        "No.", "Name", "Type", "Cards", "Dimensions", "Format"
    ));
    for s in summaries {
        output.push_str(&format!(
            "{:>3}   {:<10} {:<12} {:>5}   {:<14} {}\n",
            s.index, s.name, s.kind, s.cards, s.dimensions, s.format
        ));
    }
    output
}

/// The headers of every HDU in a FITS file
#[derive(Debug, Clone)]
pub struct FitsFile {
    pub path: PathBuf,
    pub hdus: Vec<Hdu>,
}

impl FitsFile {
    /// Read every header of a file. Gzip-compressed files are decompressed
    /// by cfitsio.
    pub fn open(path: &Path) -> Result<Self, FitsError> {
        let file = path.display().to_string();
        let mut fptr = FitsHandle::open(path).map_err(|e| FitsError::Open {
            file: file.clone(),
            source: Box::new(e),
        })?;

        let count = hdu_count(&mut fptr, &file)?;
        let mut hdus = Vec::with_capacity(count);
        for index in 0..count {
            move_to_hdu(&mut fptr, &file, index)?;
            let header = read_header(&mut fptr, &file, index)?;
            tracing::debug!("{}: HDU {} has {} cards", file, index, header.len());
            hdus.push(Hdu::new(header));
        }

        Ok(Self {
            path: path.to_path_buf(),
            hdus,
        })
    }

    pub fn summaries(&self) -> Vec<HduSummary> {
        self.hdus
            .iter()
            .enumerate()
            .map(|(i, hdu)| hdu.summary(i))
            .collect()
    }
}

fn check(status: c_int, file: &str, action: &str) -> Result<(), FitsError> {
    fits_check_status(status).map_err(|e| FitsError::Fitsio {
        file: file.to_string(),
        action: action.to_string(),
        source: Box::new(e),
    })
}

fn hdu_count(fptr: &mut FitsHandle, file: &str) -> Result<usize, FitsError> {
    let mut count = 0;
    let mut status = 0;
    unsafe {
        // ffthdu = fits_get_num_hdus
        fitsio_sys::ffthdu(
            fptr.as_raw(), /* I - FITS file pointer  */
            &mut count,    /* O - number of HDUs     */
            &mut status,   /* IO - error status      */
        );
    }
    check(status, file, "counting HDUs")?;
    Ok(usize::try_from(count).unwrap_or(0))
}

fn move_to_hdu(fptr: &mut FitsHandle, file: &str, index: usize) -> Result<(), FitsError> {
    let number = c_int::try_from(index + 1).unwrap_or(c_int::MAX);
    let mut status = 0;
    unsafe {
        // ffmahd = fits_movabs_hdu
        fitsio_sys::ffmahd(
            fptr.as_raw(),        /* I - FITS file pointer             */
            number,               /* I - number of the HDU to move to  */
            std::ptr::null_mut(), /* O - type of extension, 0, 1, or 2 */
            &mut status,          /* IO - error status                 */
        );
    }
    check(status, file, &format!("moving to HDU {}", index))
}

/// Parse every record of the current HDU's header. Blank records are
/// reserved space and skipped.
fn read_header(fptr: &mut FitsHandle, file: &str, index: usize) -> Result<Header, FitsError> {
    let mut records = 0;
    let mut status = 0;
    unsafe {
        // ffghsp = fits_get_hdrspace
        fitsio_sys::ffghsp(
            fptr.as_raw(),        /* I - FITS file pointer                */
            &mut records,         /* O - number of existing keywords      */
            std::ptr::null_mut(), /* O - how many more keywords will fit  */
            &mut status,          /* IO - error status                    */
        );
    }
    check(status, file, &format!("reading the size of header {}", index))?;

    let mut header = Header::new();
    let mut buffer: [c_char; CARD_LEN + 1] = [0; CARD_LEN + 1];
    for keynum in 1..=records {
        unsafe {
            // ffgrec = fits_read_record
            fitsio_sys::ffgrec(
                fptr.as_raw(),       /* I - FITS file pointer      */
                keynum,              /* I - number of the record   */
                buffer.as_mut_ptr(), /* O - the 80-char record     */
                &mut status,         /* IO - error status          */
            );
        }
        check(status, file, &format!("reading record {} of HDU {}", keynum, index))?;

        let record = unsafe { CStr::from_ptr(buffer.as_ptr()) }.to_string_lossy();
        if record.trim().is_empty() {
            continue;
        }
        let line = usize::try_from(keynum).unwrap_or_default();
        let card = Card::parse(&record, line).map_err(|source| FitsError::Card {
            file: file.to_string(),
            hdu: index,
            source,
        })?;
        header.push(card);
    }
    Ok(header)
}

/// Append one 80-column record to the current HDU's header
fn write_record(fptr: &mut FitsHandle, file: &str, card: &Card) -> Result<(), FitsError> {
    let record = card.to_card_string().map_err(|source| FitsError::Card {
        file: file.to_string(),
        hdu: 0,
        source,
    })?;
    let record = c_string(file, &card.keyword, &record)?;
    let mut status = 0;
    unsafe {
        // ffprec = fits_write_record
        fitsio_sys::ffprec(
            fptr.as_raw(),     /* I - FITS file pointer  */
            record.as_ptr(),   /* I - card to write      */
            &mut status,       /* IO - error status      */
        );
    }
    check(status, file, &format!("writing {}", card.keyword))
}

fn c_string(file: &str, keyword: &str, text: &str) -> Result<CString, FitsError> {
    CString::new(text).map_err(|_| FitsError::NulByte {
        file: file.to_string(),
        keyword: keyword.to_string(),
    })
}

/// The primary header of a file opened for editing in place
pub struct PrimaryHeaderEditor {
    fptr: FitsHandle,
    file: String,
}

impl PrimaryHeaderEditor {
    pub fn open(path: &Path) -> Result<Self, FitsError> {
        let file = path.display().to_string();
        let fptr = FitsHandle::edit(path).map_err(|e| FitsError::Open {
            file: file.clone(),
            source: Box::new(e),
        })?;
        let mut editor = Self { fptr, file };
        move_to_hdu(&mut editor.fptr, &editor.file, 0)?;
        Ok(editor)
    }

    fn card_error(&self, source: HeaderError) -> FitsError {
        FitsError::Card {
            file: self.file.clone(),
            hdu: 0,
            source,
        }
    }

    /// Write one card. A keyword card overwrites the first card with the
    /// same keyword in place, or is appended; commentary cards are appended.
    /// String values too long for one card are continued over CONTINUE
    /// cards.
    pub fn write(&mut self, card: &Card) -> Result<(), FitsError> {
        card.check_width().map_err(|e| self.card_error(e))?;

        let keyword = c_string(&self.file, &card.keyword, &card.keyword)?;
        let comment = c_string(
            &self.file,
            &card.keyword,
            card.comment.as_deref().unwrap_or(""),
        )?;
        let mut status = 0;

        match &card.value {
            None if card.keyword == "COMMENT" => unsafe {
                // ffpcom = fits_write_comment
                fitsio_sys::ffpcom(self.fptr.as_raw(), comment.as_ptr(), &mut status);
            },
            None if card.keyword == "HISTORY" => unsafe {
                // ffphis = fits_write_history
                fitsio_sys::ffphis(self.fptr.as_raw(), comment.as_ptr(), &mut status);
            },
            None => return write_record(&mut self.fptr, &self.file, card),
            Some(Value::Str(value)) => {
                if card.to_card_string().is_err() {
                    self.declare_long_strings()?;
                }
                let value = c_string(&self.file, &card.keyword, value)?;
                unsafe {
                    // ffukls = fits_update_key_longstr
                    fitsio_sys::ffukls(
                        self.fptr.as_raw(), /* I - FITS file pointer        */
                        keyword.as_ptr(),   /* I - name of keyword to write */
                        value.as_ptr(),     /* I - keyword value            */
                        comment.as_ptr(),   /* I - keyword comment          */
                        &mut status,        /* IO - error status            */
                    );
                }
            }
            Some(_) => {
                let record = card.to_card_string().map_err(|e| self.card_error(e))?;
                let record = c_string(&self.file, &card.keyword, &record)?;
                unsafe {
                    // ffucrd = fits_update_card
                    fitsio_sys::ffucrd(
                        self.fptr.as_raw(), /* I - FITS file pointer  */
                        keyword.as_ptr(),   /* I - keyword name       */
                        record.as_ptr(),    /* I - card to write      */
                        &mut status,        /* IO - error status      */
                    );
                }
            }
        }
        check(status, &self.file, &format!("writing {}", card.keyword))
    }

    /// Add the LONGSTRN keyword announcing CONTINUE cards, unless present
    fn declare_long_strings(&mut self) -> Result<(), FitsError> {
        let mut status = 0;
        unsafe {
            // ffplsw = fits_write_key_longwarn
            fitsio_sys::ffplsw(self.fptr.as_raw(), &mut status);
        }
        check(status, &self.file, "writing LONGSTRN")
    }

    /// Flush pending changes so write errors surface here rather than when
    /// the file is closed
    pub fn flush(&mut self) -> Result<(), FitsError> {
        let mut status = 0;
        unsafe {
            // ffflus = fits_flush_file
            fitsio_sys::ffflus(self.fptr.as_raw(), &mut status);
        }
        check(status, &self.file, "flushing")
    }
}

/// Copy a FITS file, decompressing it if it is gzipped. Returns the number
/// of bytes written.
pub fn copy_uncompressed(from: &Path, to: &Path) -> Result<u64, FitsError> {
    let mut input = BufReader::new(File::open(from)?);
    let gzipped = input.fill_buf()?.starts_with(&GZIP_MAGIC);
    let mut output = BufWriter::new(File::create(to)?);

    let written = if gzipped {
        io::copy(&mut GzDecoder::new(input), &mut output)?
    } else {
        io::copy(&mut input, &mut output)?
    };
    output.flush()?;

    tracing::debug!(
        "Copied {} to {} ({} bytes{})",
        from.display(),
        to.display(),
        written,
        if gzipped { ", decompressed" } else { "" }
    );
    Ok(written)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use fitsio::images::{ImageDescription, ImageType};
    use fitsio::tables::{ColumnDataType, ColumnDescription};

    /// Build a header from `(keyword, value)` pairs
    pub fn header_from_pairs(pairs: &[(&str, Value)]) -> Header {
        Header::from_cards(
            pairs
                .iter()
                .map(|(keyword, value)| Card::new(keyword, value.clone(), None))
                .collect(),
        )
    }

    fn with_extra(mut header: Header, extra: Vec<Card>) -> Hdu {
        for card in extra {
            header.push(card);
        }
        Hdu::new(header)
    }

    /// 3x2 int16 primary image
    pub fn primary(extra: Vec<Card>) -> Hdu {
        let header = header_from_pairs(&[
            ("SIMPLE", Value::Logical(true)),
            ("BITPIX", Value::Int(16)),
            ("NAXIS", Value::Int(2)),
            ("NAXIS1", Value::Int(3)),
            ("NAXIS2", Value::Int(2)),
            ("EXTEND", Value::Logical(true)),
        ]);
        with_extra(header, extra)
    }

    /// 4-element float32 image extension
    pub fn image_ext(name: &str, extra: Vec<Card>) -> Hdu {
        let header = header_from_pairs(&[
            ("XTENSION", Value::Str("IMAGE".to_string())),
            ("BITPIX", Value::Int(-32)),
            ("NAXIS", Value::Int(1)),
            ("NAXIS1", Value::Int(4)),
            ("PCOUNT", Value::Int(0)),
            ("GCOUNT", Value::Int(1)),
            ("EXTNAME", Value::Str(name.to_string())),
        ]);
        with_extra(header, extra)
    }

    /// Three-row binary table with a float and an int column
    pub fn bintable_ext(name: &str) -> Hdu {
        Hdu::new(header_from_pairs(&[
            ("XTENSION", Value::Str("BINTABLE".to_string())),
            ("BITPIX", Value::Int(8)),
            ("NAXIS", Value::Int(2)),
            ("NAXIS1", Value::Int(8)),
            ("NAXIS2", Value::Int(3)),
            ("PCOUNT", Value::Int(0)),
            ("GCOUNT", Value::Int(1)),
            ("TFIELDS", Value::Int(2)),
            ("TFORM1", Value::Str("1E".to_string())),
            ("TFORM2", Value::Str("1J".to_string())),
            ("EXTNAME", Value::Str(name.to_string())),
        ]))
    }

    /// Keywords cfitsio writes itself when it creates an HDU
    fn is_generated(keyword: &str) -> bool {
        let numbered = |prefix: &str| {
            keyword
                .strip_prefix(prefix)
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        };
        matches!(
            keyword,
            "SIMPLE" | "XTENSION" | "BITPIX" | "NAXIS" | "EXTEND" | "PCOUNT" | "GCOUNT"
                | "TFIELDS" | "EXTNAME"
        ) || numbered("NAXIS")
            || numbered("TFORM")
            || numbered("TTYPE")
    }

    fn image_type(bitpix: i64) -> ImageType {
        match bitpix {
            8 => ImageType::UnsignedByte,
            16 => ImageType::Short,
            32 => ImageType::Long,
            -32 => ImageType::Float,
            _ => ImageType::Double,
        }
    }

    /// Pixel values 0, 1, 2, ... for an image HDU
    pub fn pixels(hdu: &Hdu) -> Vec<f32> {
        let len: i64 = hdu.axes().iter().product();
        (0..len).map(|v| v as f32).collect()
    }

    /// Write `hdus` with cfitsio. The layout comes from each header's
    /// structural keywords; every other card is written as given.
    pub fn write(dir: &Path, name: &str, hdus: Vec<Hdu>) -> PathBuf {
        let path = dir.join(name);
        let (first, extensions) = hdus.split_first().unwrap();

        let dimensions: Vec<usize> = first.axes().iter().rev().map(|&n| n as usize).collect();
        let description = ImageDescription {
            data_type: image_type(first.header.int("BITPIX").unwrap()),
            dimensions: &dimensions,
        };
        let mut fptr = FitsHandle::create(&path)
            .with_custom_primary(&description)
            .open()
            .unwrap();
        let hdu = fptr.hdu(0).unwrap();
        hdu.write_image(&mut fptr, &pixels(first)).unwrap();
        write_extra_cards(&mut fptr, first);

        for ext in extensions {
            match ext.kind() {
                HduKind::Image => {
                    let dimensions: Vec<usize> =
                        ext.axes().iter().rev().map(|&n| n as usize).collect();
                    let description = ImageDescription {
                        data_type: image_type(ext.header.int("BITPIX").unwrap()),
                        dimensions: &dimensions,
                    };
                    let hdu = fptr.create_image(ext.name(), &description).unwrap();
                    hdu.write_image(&mut fptr, &pixels(ext)).unwrap();
                }
                HduKind::BinTable => write_table(&mut fptr, ext),
                other => panic!("no fixture support for {}", other),
            }
            write_extra_cards(&mut fptr, ext);
        }
        path
    }

    fn write_table(fptr: &mut FitsHandle, ext: &Hdu) {
        let fields = ext.header.int("TFIELDS").unwrap_or(0);
        let rows = ext.header.int("NAXIS2").unwrap_or(0);
        let forms: Vec<String> = (1..=fields)
            .map(|n| ext.header.string(&format!("TFORM{}", n)).unwrap().to_string())
            .collect();

        let columns: Vec<_> = forms
            .iter()
            .enumerate()
            .map(|(i, form)| {
                let data_type = match form.as_str() {
                    "1E" => ColumnDataType::Float,
                    "1J" => ColumnDataType::Int,
                    other => panic!("no fixture support for TFORM {}", other),
                };
                ColumnDescription::new(format!("C{}", i + 1))
                    .with_type(data_type)
                    .create()
                    .unwrap()
            })
            .collect();
        let hdu = fptr.create_table(ext.name(), &columns).unwrap();

        for (i, form) in forms.iter().enumerate() {
            let name = format!("C{}", i + 1);
            if form == "1E" {
                let values: Vec<f32> = (0..rows).map(|v| v as f32 * 0.5).collect();
                hdu.write_col(fptr, &name, &values).unwrap();
            } else {
                let values: Vec<i32> = (0..rows).map(|v| v as i32).collect();
                hdu.write_col(fptr, &name, &values).unwrap();
            }
        }
    }

    fn write_extra_cards(fptr: &mut FitsHandle, hdu: &Hdu) {
        for card in hdu.header.cards() {
            if !is_generated(&card.keyword) {
                write_record(fptr, "fixture", card).unwrap();
            }
        }
    }

    /// Raw header block, for headers cfitsio would refuse to create
    pub fn raw_header_block(header: &Header) -> Vec<u8> {
        let mut text = String::new();
        for card in header.cards() {
            text.push_str(&card.to_card_string().unwrap());
        }
        text.push_str(&format!("{:<width$}", "END", width = CARD_LEN));
        let mut bytes = text.into_bytes();
        bytes.resize(bytes.len().div_ceil(2880) * 2880, b' ');
        bytes
    }
}
