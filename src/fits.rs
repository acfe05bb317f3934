//! # FITS file access
//!
//! Thin layer over [`fitsio`] for the files OpihiExarata touches:
//!
//! - Opihi science images: primary HDU image plus a handful of header keys
//!   (`FWHL` filter wheel, `ITIME` exposure, `MJD_OBS` observation time).
//! - astrometry.net result files: the `wcs` header and the `corr` binary table.
//!
//! Images are returned as [`nalgebra::DMatrix`] with **rows = y** and **columns = x**,
//! the same orientation as the FITS data array.
//!
//! Solved images are saved by [`update_fits_header_file`], which copies the
//! image and appends the result cards of [`crate::opihi::OpihiSolution`] in order.
use std::fs;

use camino::Utf8Path;
use fitsio::{
    hdu::HduInfo,
    images::{ImageDescription, ImageType},
    FitsFile,
};
use nalgebra::DMatrix;

use crate::exarata_errors::ExarataError;

/// Header keys read from Opihi images and astrometry.net WCS files.
pub const KNOWN_HEADER_KEYS: [&str; 20] = [
    "FWHL", "ITIME", "MJD_OBS", "OBJECT", "NAXIS1", "NAXIS2", "CTYPE1", "CTYPE2", "CRPIX1", "CRPIX2",
    "CRVAL1", "CRVAL2", "CD1_1", "CD1_2", "CD2_1", "CD2_2", "CDELT1", "CDELT2", "CROTA2", "EQUINOX",
];

/// Longest keyword of a FITS header card.
pub const MAXIMUM_KEYWORD_LENGTH: usize = 8;

/// A header card value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Number(f64),
    Text(String),
    /// Written as the integer 1 or 0, read back as a [`HeaderValue::Number`].
    Flag(bool),
}

/// Header cards, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<(String, HeaderValue)>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a card. A key already present keeps its place.
    pub fn insert(&mut self, key: &str, value: HeaderValue) {
        let key = key.to_uppercase();
        match self.cards.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.cards.push((key, value)),
        }
    }

    /// Append every card of another header, in its order.
    pub fn extend(&mut self, other: &FitsHeader) {
        for (key, value) in other.iter() {
            self.insert(key, value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        let key = key.to_uppercase();
        self.cards.iter().find(|(existing, _)| *existing == key).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Numeric value of a card; text cards holding a number are parsed.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            HeaderValue::Number(value) => Some(*value),
            HeaderValue::Text(text) => text.trim().parse().ok(),
            HeaderValue::Flag(flag) => Some(f64::from(u8::from(*flag))),
        }
    }

    /// Text value of a card; numbers are formatted.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            HeaderValue::Number(value) => Some(value.to_string()),
            HeaderValue::Text(text) => Some(text.trim().to_string()),
            HeaderValue::Flag(flag) => Some(if *flag { "T" } else { "F" }.to_string()),
        }
    }

    /// Numeric card or an [`ExarataError::Input`] naming the missing key.
    pub fn require_f64(&self, key: &str) -> Result<f64, ExarataError> {
        self.get_f64(key)
            .ok_or_else(|| ExarataError::Input(format!("The FITS header has no numeric `{key}` card")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.cards.iter().map(|(key, value)| (key.as_str(), value))
    }
}

fn open_existing(path: &Utf8Path) -> Result<FitsFile, ExarataError> {
    if !path.is_file() {
        return Err(ExarataError::File(format!("The FITS file `{path}` does not exist")));
    }
    Ok(FitsFile::open(path)?)
}

fn read_header(fptr: &mut FitsFile, hdu: &fitsio::hdu::FitsHdu, keys: &[&str]) -> FitsHeader {
    let mut header = FitsHeader::new();
    for &key in keys {
        if let Ok(value) = hdu.read_key::<f64>(fptr, key) {
            header.insert(key, HeaderValue::Number(value));
        } else if let Ok(value) = hdu.read_key::<String>(fptr, key) {
            header.insert(key, HeaderValue::Text(value));
        }
    }
    header
}

/// Read the header and image data of the primary HDU.
pub fn read_fits_image_file(path: &Utf8Path) -> Result<(FitsHeader, DMatrix<f64>), ExarataError> {
    let mut fptr = open_existing(path)?;
    let hdu = fptr.primary_hdu()?;
    let header = read_header(&mut fptr, &hdu, &KNOWN_HEADER_KEYS);

    let shape = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => shape.clone(),
        _ => {
            return Err(ExarataError::Input(format!(
                "The primary HDU of `{path}` is not a two dimensional image"
            )))
        }
    };
    let pixels: Vec<f64> = hdu.read_image(&mut fptr)?;
    let (rows, cols) = (shape[0], shape[1]);
    if pixels.len() != rows * cols {
        return Err(ExarataError::Input(format!(
            "The image of `{path}` has {} pixels for a {rows}x{cols} shape",
            pixels.len()
        )));
    }
    Ok((header, DMatrix::from_row_slice(rows, cols, &pixels)))
}

/// Read only the primary header of a FITS file, for the [`KNOWN_HEADER_KEYS`].
pub fn read_fits_header(path: &Utf8Path) -> Result<FitsHeader, ExarataError> {
    read_fits_header_cards(path, &KNOWN_HEADER_KEYS)
}

/// Read the given cards of the primary header; absent ones are skipped.
pub fn read_fits_header_cards(path: &Utf8Path, keys: &[&str]) -> Result<FitsHeader, ExarataError> {
    let mut fptr = open_existing(path)?;
    let hdu = fptr.primary_hdu()?;
    Ok(read_header(&mut fptr, &hdu, keys))
}

fn write_cards(fptr: &mut FitsFile, hdu: &fitsio::hdu::FitsHdu, header: &FitsHeader) -> Result<(), ExarataError> {
    for (key, value) in header.iter().filter(|(key, _)| !key.starts_with("NAXIS")) {
        if key.len() > MAXIMUM_KEYWORD_LENGTH {
            return Err(ExarataError::Input(format!(
                "The FITS header key `{key}` is longer than {MAXIMUM_KEYWORD_LENGTH} characters"
            )));
        }
        match value {
            HeaderValue::Number(number) => hdu.write_key(fptr, key, *number)?,
            HeaderValue::Text(text) => hdu.write_key(fptr, key, text.as_str())?,
            HeaderValue::Flag(flag) => hdu.write_key(fptr, key, i64::from(*flag))?,
        }
    }
    Ok(())
}

/// Read numeric columns of the first binary table extension.
///
/// Return
/// ----------
/// * One vector per requested column, in the order requested.
pub fn read_fits_table_file(path: &Utf8Path, columns: &[&str]) -> Result<Vec<Vec<f64>>, ExarataError> {
    let mut fptr = open_existing(path)?;
    let hdu = fptr.hdu(1)?;
    columns
        .iter()
        .map(|column| hdu.read_col::<f64>(&mut fptr, column).map_err(ExarataError::from))
        .collect()
}

/// Write an image and header cards to the primary HDU of a new file.
pub fn write_fits_image_file(
    path: &Utf8Path,
    header: &FitsHeader,
    data: &DMatrix<f64>,
    overwrite: bool,
) -> Result<(), ExarataError> {
    if path.exists() && !overwrite {
        return Err(ExarataError::File(format!(
            "The FITS file `{path}` already exists, overwrite is False"
        )));
    }
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[data.nrows(), data.ncols()],
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;

    // row-major flattening of a column-major matrix
    let flat: Vec<f64> = data.transpose().as_slice().to_vec();
    hdu.write_image(&mut fptr, &flat)?;

    write_cards(&mut fptr, &hdu, header)
}

/// Copy a FITS file and set header cards on the primary HDU of the copy.
///
/// Every card of the source is kept; the given cards are updated in place
/// when present and appended in order otherwise.
///
/// Arguments
/// -----------------
/// * `source`: the file to copy, left untouched unless it is also the destination.
/// * `destination`: the file to write.
/// * `header`: the cards to set.
/// * `overwrite`: replace an existing destination.
///
/// Return
/// ----------
/// * [`ExarataError::File`] if the destination exists and `overwrite` is
///   false, [`ExarataError::Input`] for a key longer than eight characters.
pub fn update_fits_header_file(
    source: &Utf8Path,
    destination: &Utf8Path,
    header: &FitsHeader,
    overwrite: bool,
) -> Result<(), ExarataError> {
    if !source.is_file() {
        return Err(ExarataError::File(format!("The FITS file `{source}` does not exist")));
    }
    if destination.exists() && !overwrite {
        return Err(ExarataError::File(format!(
            "The FITS file `{destination}` already exists, overwrite is False"
        )));
    }
    if source != destination {
        fs::copy(source, destination)?;
    }
    let mut fptr = FitsFile::edit(destination)?;
    let hdu = fptr.primary_hdu()?;
    write_cards(&mut fptr, &hdu, header)
}

#[cfg(test)]
mod fits_test {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn test_header_lookups() {
        let mut header = FitsHeader::new();
        header.insert("itime", HeaderValue::Number(30.0));
        header.insert("FWHL", HeaderValue::Text("r'  ".into()));
        header.insert("MJD_OBS", HeaderValue::Text("59000.25".into()));

        assert_eq!(header.get_f64("ITIME"), Some(30.0));
        assert_eq!(header.get_string("fwhl"), Some("r'".to_string()));
        assert_eq!(header.get_f64("MJD_OBS"), Some(59000.25));
        assert!(matches!(header.require_f64("CRPIX1"), Err(ExarataError::Input(_))));
    }

    #[test]
    fn test_image_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("image.fits")).unwrap();

        let data = DMatrix::from_fn(4, 6, |row, col| (row * 10 + col) as f64);
        let mut header = FitsHeader::new();
        header.insert("ITIME", HeaderValue::Number(12.5));
        header.insert("FWHL", HeaderValue::Text("g".into()));
        write_fits_image_file(&path, &header, &data, false).unwrap();

        let (read_header, read_data) = read_fits_image_file(&path).unwrap();
        assert_eq!(read_data.shape(), (4, 6));
        assert_eq!(read_data[(2, 5)], 25.0);
        assert_eq!(read_header.get_f64("ITIME"), Some(12.5));
        assert_eq!(read_header.get_string("FWHL"), Some("g".to_string()));

        assert!(matches!(
            write_fits_image_file(&path, &header, &data, false),
            Err(ExarataError::File(_))
        ));
    }

    #[test]
    fn test_header_keeps_insertion_order() {
        let mut header = FitsHeader::new();
        header.insert("OX_BEGIN", HeaderValue::Flag(true));
        header.insert("CRPIX1", HeaderValue::Number(1.0));
        header.insert("OX___END", HeaderValue::Flag(true));
        header.insert("crpix1", HeaderValue::Number(2.0));

        let keys: Vec<&str> = header.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["OX_BEGIN", "CRPIX1", "OX___END"]);
        assert_eq!(header.get_f64("CRPIX1"), Some(2.0));
        assert_eq!(header.get_f64("OX_BEGIN"), Some(1.0));
    }

    #[test]
    fn test_update_header_of_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = Utf8PathBuf::from_path_buf(dir.path().join("raw.fits")).unwrap();
        let destination = Utf8PathBuf::from_path_buf(dir.path().join("solved.fits")).unwrap();

        let mut raw = FitsHeader::new();
        raw.insert("ITIME", HeaderValue::Number(5.0));
        write_fits_image_file(&source, &raw, &DMatrix::from_element(3, 3, 2.0), false).unwrap();

        let mut cards = FitsHeader::new();
        cards.insert("OX_BEGIN", HeaderValue::Flag(true));
        cards.insert("OXT_NAME", HeaderValue::Text("K22A01A".into()));
        update_fits_header_file(&source, &destination, &cards, false).unwrap();

        let read = read_fits_header_cards(&destination, &["ITIME", "OX_BEGIN", "OXT_NAME"]).unwrap();
        assert_eq!(read.get_f64("ITIME"), Some(5.0));
        assert_eq!(read.get_f64("OX_BEGIN"), Some(1.0));
        assert_eq!(read.get_string("OXT_NAME"), Some("K22A01A".to_string()));
        let (_, data) = read_fits_image_file(&destination).unwrap();
        assert_eq!(data[(1, 1)], 2.0);
        // the source is left as it was
        assert_eq!(read_fits_header_cards(&source, &["OX_BEGIN"]).unwrap().len(), 0);

        assert!(matches!(
            update_fits_header_file(&source, &destination, &cards, false),
            Err(ExarataError::File(_))
        ));
        let mut long = FitsHeader::new();
        long.insert("OXTOOLONGKEY", HeaderValue::Number(1.0));
        assert!(matches!(
            update_fits_header_file(&source, &destination, &long, true),
            Err(ExarataError::Input(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = read_fits_image_file(Utf8Path::new("/nonexistent/image.fits"));
        assert!(matches!(result, Err(ExarataError::File(_))));
    }
}
