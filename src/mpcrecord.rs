//! # MPC 80-column records
//!
//! Utilities to move between the Minor Planet Center **80-column** observation
//! format and a field-wise representation, [`MpcRecord`].
//!
//! ## Overview
//! -----------------
//! - [`minor_planet_record_to_table`] splits raw lines into [`MpcRecord`] rows,
//!   keeping every field as text.
//! - [`minor_planet_table_to_record`] serializes rows back into 80-column lines,
//!   cutting and padding each field to its width.
//! - [`MpcRecord::observation`] interprets a row into numbers
//!   ([`MpcObservation`]), and [`MpcRecord::from_observation`] goes the other way.
//!
//! ## Field Layout
//! -----------------
//! | columns | field |
//! |---|---|
//! | `0..5`   | packed minor planet number |
//! | `5..12`  | packed provisional designation |
//! | `12`     | discovery asterisk |
//! | `13`     | publishable note |
//! | `14`     | observing note (`C` for CCD) |
//! | `15..32` | date, `YYYY MM DD.dddddd` |
//! | `32..44` | right ascension, `HH MM SS.sss` |
//! | `44..56` | declination, `sDD MM SS.ss` |
//! | `56..65` | blank |
//! | `65..71` | magnitude and band |
//! | `71..77` | blank |
//! | `77..80` | observatory code |
//!
//! ## See also
//! ------------
//! * <https://www.minorplanetcenter.net/iau/info/OpticalObs.html>
//! * [`crate::conversion::sexagesimal_ra_dec_to_degrees`]: RA/Dec field parsing.
use std::fs;

use camino::Utf8Path;
use itertools::Itertools;

use crate::{
    constants::{Degree, JulianDay},
    conversion::{decimal_day_to_julian_day, degrees_to_sexagesimal_ra_dec, julian_day_to_decimal_day, sexagesimal_ra_dec_to_degrees},
    exarata_errors::{ExarataError, TerminalError},
};

/// Length of one record line.
pub const MPC_RECORD_LENGTH: usize = 80;

/// One 80-column observation, field by field, as text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MpcRecord {
    pub packed_mpc_number: String,
    pub packed_provisional_number: String,
    pub discovery_asterisk: String,
    pub publishable_note: String,
    pub observing_note: String,
    pub date: String,
    pub ra: String,
    pub dec: String,
    pub blank: String,
    pub magnitude_and_band: String,
    pub pseudo_blank: String,
    pub observatory_code: String,
}

/// The numeric content of one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct MpcObservation {
    pub minor_planet_number: String,
    pub provisional_number: String,
    pub discovery: bool,
    pub publishable_note: String,
    pub observing_note: String,
    pub year: i32,
    pub month: u8,
    pub day: f64,
    pub julian_day: JulianDay,
    pub ra: Degree,
    pub dec: Degree,
    pub magnitude: Option<f64>,
    pub bandpass: String,
    pub observatory_code: String,
}

fn slice(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect()
}

/// Trim, keep the last `width` characters, right justify.
fn right_field(value: &str, width: usize) -> String {
    let trimmed: Vec<char> = value.trim().chars().collect();
    let kept: String = trimmed[trimmed.len().saturating_sub(width)..].iter().collect();
    format!("{kept:>width$}")
}

/// Trim, keep the first `width` characters, left justify.
fn left_field(value: &str, width: usize) -> String {
    let kept: String = value.trim().chars().take(width).collect();
    format!("{kept:<width$}")
}

impl MpcRecord {
    /// Split one 80-column line into its fields.
    ///
    /// Return
    /// ----------
    /// * The record, or [`ExarataError::Input`] when the line is not exactly 80 characters.
    pub fn from_80col(line: &str) -> Result<Self, ExarataError> {
        let chars: Vec<char> = line.trim_end_matches(['\n', '\r']).chars().collect();
        if chars.len() != MPC_RECORD_LENGTH {
            return Err(ExarataError::Input(format!(
                "The line is {} characters long, it is not a standard MPC 80-column record: `{line}`",
                chars.len()
            )));
        }
        Ok(MpcRecord {
            packed_mpc_number: slice(&chars, 0, 5),
            packed_provisional_number: slice(&chars, 5, 12),
            discovery_asterisk: slice(&chars, 12, 13),
            publishable_note: slice(&chars, 13, 14),
            observing_note: slice(&chars, 14, 15),
            date: slice(&chars, 15, 32),
            ra: slice(&chars, 32, 44),
            dec: slice(&chars, 44, 56),
            blank: slice(&chars, 56, 65),
            magnitude_and_band: slice(&chars, 65, 71),
            pseudo_blank: slice(&chars, 71, 77),
            observatory_code: slice(&chars, 77, 80),
        })
    }

    /// Serialize the fields into an 80-column line.
    ///
    /// Fields which are too long are cut: identifiers and codes keep their
    /// trailing characters, date and coordinates keep their leading ones.
    pub fn to_80col(&self) -> String {
        let asterisk = if self.discovery_asterisk.trim() == "*" { "*" } else { " " };

        // band is the last raw character, the magnitude what precedes it
        let band = self.magnitude_and_band.chars().last().unwrap_or(' ');
        let trimmed = self.magnitude_and_band.trim();
        let magnitude = if band.is_whitespace() {
            right_tail(trimmed, 5)
        } else {
            let without_band: String = {
                let mut chars: Vec<char> = trimmed.chars().collect();
                chars.pop();
                chars.into_iter().collect()
            };
            right_tail(without_band.trim_end(), 5)
        };

        let record = [
            right_field(&self.packed_mpc_number, 5),
            right_field(&self.packed_provisional_number, 7),
            asterisk.to_string(),
            right_field(&self.publishable_note, 1),
            right_field(&self.observing_note, 1),
            left_field(&self.date, 17),
            left_field(&self.ra, 12),
            left_field(&self.dec, 12),
            right_field(&self.blank, 9),
            format!("{magnitude:<5}{band}"),
            right_field(&self.pseudo_blank, 6),
            right_field(&self.observatory_code, 3),
        ]
        .concat();

        if record.chars().count() != MPC_RECORD_LENGTH {
            TerminalError::Development(format!(
                "The row derived record string is not 80 columns: `{record}`"
            ))
            .halt();
        }
        record
    }

    /// Interpret the record fields into an [`MpcObservation`].
    pub fn observation(&self) -> Result<MpcObservation, ExarataError> {
        let date_parts: Vec<&str> = self.date.split_whitespace().collect();
        let (year, month, day) = match date_parts.as_slice() {
            [year, month, day] => (
                year.parse::<i32>().ok(),
                month.parse::<u8>().ok(),
                day.parse::<f64>().ok(),
            ),
            _ => (None, None, None),
        };
        let (Some(year), Some(month), Some(day)) = (year, month, day) else {
            return Err(ExarataError::Input(format!("Invalid MPC record date: `{}`", self.date)));
        };
        let julian_day = decimal_day_to_julian_day(year, month, day)?;
        let (ra, dec) = sexagesimal_ra_dec_to_degrees(&self.ra, &self.dec)?;

        let mag_chars: Vec<char> = self.magnitude_and_band.chars().collect();
        let split = mag_chars.len().min(5);
        let magnitude_text: String = mag_chars[..split].iter().collect();
        let band_text: String = mag_chars[split..].iter().collect();
        let magnitude = magnitude_text.trim().parse::<f64>().ok();

        Ok(MpcObservation {
            minor_planet_number: self.packed_mpc_number.trim().to_string(),
            provisional_number: self.packed_provisional_number.trim().to_string(),
            discovery: self.discovery_asterisk == "*",
            publishable_note: self.publishable_note.trim().to_string(),
            observing_note: self.observing_note.trim().to_string(),
            year,
            month,
            day,
            julian_day,
            ra,
            dec,
            magnitude,
            bandpass: band_text.trim().to_string(),
            observatory_code: self.observatory_code.trim().to_string(),
        })
    }

    /// Format an observation into record fields.
    ///
    /// The day is written with six decimals, RA with millisecond and Dec with
    /// centi-arcsecond precision.
    pub fn from_observation(observation: &MpcObservation) -> Self {
        let (year, month, day) = record_date(observation.year, observation.month, observation.day);
        let (ra, _) = degrees_to_sexagesimal_ra_dec(observation.ra, observation.dec, 3);
        let (_, dec) = degrees_to_sexagesimal_ra_dec(observation.ra, observation.dec, 2);
        let magnitude_and_band = match observation.magnitude {
            Some(magnitude) if magnitude.is_finite() => {
                let band = observation.bandpass.chars().next().unwrap_or(' ');
                format!("{magnitude:<5.1}{band}")
            }
            _ => " ".repeat(6),
        };

        MpcRecord {
            packed_mpc_number: observation.minor_planet_number.clone(),
            packed_provisional_number: observation.provisional_number.clone(),
            discovery_asterisk: if observation.discovery { "*".into() } else { " ".into() },
            publishable_note: observation.publishable_note.clone(),
            observing_note: observation.observing_note.clone(),
            date: format!("{year:04} {month:02} {day:09.6}"),
            ra: ra.replace(':', " "),
            dec: dec.replace(':', " "),
            blank: String::new(),
            magnitude_and_band,
            pseudo_blank: String::new(),
            observatory_code: observation.observatory_code.clone(),
        }
    }
}

/// Day rounded to the six decimals of a record, carried into the next month
/// when it rounds past the last day of its own.
fn record_date(year: i32, month: u8, day: f64) -> (i32, u8, f64) {
    let round = |day: f64| (day * 1e6).round() / 1e6;
    let day = round(day);
    if decimal_day_to_julian_day(year, month, day).is_ok() {
        return (year, month, day);
    }
    match decimal_day_to_julian_day(year, month, 1.0) {
        Ok(first) => {
            let (year, month, carried) = julian_day_to_decimal_day(first + (day - 1.0));
            (year, month, round(carried))
        }
        Err(_) => (year, month, day),
    }
}

fn right_tail(value: &str, width: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars[chars.len().saturating_sub(width)..].iter().collect()
}

impl MpcObservation {
    /// A blank observation at a given time and position, to be filled in further.
    pub fn at(julian_day: JulianDay, ra: Degree, dec: Degree, observatory_code: &str) -> Self {
        let (year, month, day) = julian_day_to_decimal_day(julian_day);
        MpcObservation {
            minor_planet_number: String::new(),
            provisional_number: String::new(),
            discovery: false,
            publishable_note: String::new(),
            observing_note: "C".into(),
            year,
            month,
            day,
            julian_day,
            ra,
            dec,
            magnitude: None,
            bandpass: String::new(),
            observatory_code: observatory_code.to_string(),
        }
    }
}

/// Split 80-column lines into records. Every line must be exactly 80 characters.
pub fn minor_planet_record_to_table<S: AsRef<str>>(records: &[S]) -> Result<Vec<MpcRecord>, ExarataError> {
    records.iter().map(|line| MpcRecord::from_80col(line.as_ref())).collect()
}

/// Serialize records into 80-column lines.
pub fn minor_planet_table_to_record(table: &[MpcRecord]) -> Vec<String> {
    table.iter().map(MpcRecord::to_80col).collect()
}

/// Remove empty and duplicated lines, keeping the first occurrence order.
pub fn clean_minor_planet_record<S: AsRef<str>>(records: &[S]) -> Vec<String> {
    records
        .iter()
        .map(|line| line.as_ref().trim_end_matches(['\n', '\r']).to_string())
        .filter(|line| !line.trim().is_empty())
        .unique()
        .collect()
}

/// Read an MPC record file, one observation per line.
pub fn read_minor_planet_record_file(path: &Utf8Path) -> Result<Vec<String>, ExarataError> {
    let content = fs::read_to_string(path)
        .map_err(|err| ExarataError::File(format!("Cannot read the MPC record `{path}`: {err}")))?;
    Ok(clean_minor_planet_record(&content.lines().collect::<Vec<_>>()))
}

#[cfg(test)]
mod mpcrecord_test {
    use super::*;
    use approx::assert_relative_eq;

    const K07Q04R: &str =
        "     K07Q04R  C2007 08 17.35528 21 18 20.88 -14 57 59.8          19.3 R      568";
    const EROS: &str =
        "00433         C2021 03 04.12345617 02 14.123+21 45 13.45         12.7 V      T12";

    #[test]
    fn test_from_80col_slices_fields() {
        let record = MpcRecord::from_80col(K07Q04R).unwrap();
        assert_eq!(record.packed_provisional_number, "K07Q04R");
        assert_eq!(record.observing_note, "C");
        assert_eq!(record.date, "2007 08 17.35528 ");
        assert_eq!(record.ra, "21 18 20.88 ");
        assert_eq!(record.dec, "-14 57 59.8 ");
        assert_eq!(record.magnitude_and_band, "19.3 R");
        assert_eq!(record.observatory_code, "568");
    }

    #[test]
    fn test_line_length_is_enforced() {
        let short = &K07Q04R[..79];
        assert!(matches!(MpcRecord::from_80col(short), Err(ExarataError::Input(_))));
        let long = format!("{K07Q04R} ");
        assert!(minor_planet_record_to_table(&[long]).is_err());
    }

    #[test]
    fn test_table_to_record_reproduces_lines() {
        let table = minor_planet_record_to_table(&[K07Q04R, EROS]).unwrap();
        let records = minor_planet_table_to_record(&table);
        assert_eq!(records, vec![K07Q04R.to_string(), EROS.to_string()]);
    }

    #[test]
    fn test_overlong_fields_are_cut() {
        let record = MpcRecord {
            packed_provisional_number: "ABCK07Q04R".into(),
            date: "2007 08 17.3552812345".into(),
            observatory_code: "X568".into(),
            magnitude_and_band: "19.3V".into(),
            ..Default::default()
        };
        let line = record.to_80col();
        assert_eq!(line.len(), 80);
        assert_eq!(&line[5..12], "K07Q04R");
        assert_eq!(&line[15..32], "2007 08 17.355281");
        assert_eq!(&line[65..71], "19.3 V");
        assert_eq!(&line[77..80], "568");
    }

    #[test]
    fn test_observation_values() {
        let observation = MpcRecord::from_80col(EROS).unwrap().observation().unwrap();
        assert_eq!(observation.minor_planet_number, "00433");
        assert_eq!((observation.year, observation.month), (2021, 3));
        assert_relative_eq!(observation.day, 4.123456);
        assert_relative_eq!(observation.ra, (17.0 + 2.0 / 60.0 + 14.123 / 3600.0) * 15.0, epsilon = 1e-9);
        assert_relative_eq!(observation.dec, 21.0 + 45.0 / 60.0 + 13.45 / 3600.0, epsilon = 1e-9);
        assert_eq!(observation.magnitude, Some(12.7));
        assert_eq!(observation.bandpass, "V");
        assert_eq!(observation.observatory_code, "T12");
    }

    #[test]
    fn test_observation_to_record_line() {
        let observation = MpcRecord::from_80col(EROS).unwrap().observation().unwrap();
        let line = MpcRecord::from_observation(&observation).to_80col();
        assert_eq!(line, EROS);
    }

    #[test]
    fn test_day_rounding_carries_into_next_month() {
        // 43 ms before midnight of 2020-05-31
        let observation = MpcObservation::at(2459001.4999999995, 150.0, 30.0, "568");
        assert_eq!((observation.year, observation.month), (2020, 5));

        let record = MpcRecord::from_observation(&observation);
        assert_eq!(record.date, "2020 06 01.000000");
        let line = record.to_80col();
        let back = MpcRecord::from_80col(&line).unwrap().observation().unwrap();
        assert_eq!((back.year, back.month), (2020, 6));
        assert_relative_eq!(back.julian_day, 2459001.5, epsilon = 1e-6);

        let december = MpcObservation { year: 2021, month: 12, day: 31.99999999, ..observation };
        assert_eq!(MpcRecord::from_observation(&december).date, "2022 01 01.000000");
    }

    #[test]
    fn test_clean_record() {
        let cleaned = clean_minor_planet_record(&[K07Q04R, "", EROS, K07Q04R, "   "]);
        assert_eq!(cleaned, vec![K07Q04R.to_string(), EROS.to_string()]);
    }
}
