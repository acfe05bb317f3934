//! # Unit and format conversions
//!
//! Time conversions go through [`hifitime::Epoch`] in the **UTC** scale; Julian
//! days in this crate are always UTC Julian days. Angle conversions cover the
//! sexagesimal strings found in MPC records and FITS headers.
//!
//! ## See also
//! ------------
//! * [`crate::mpcrecord`]: uses the sexagesimal parsers on record fields.
//! * [`crate::propagate`]: fits motion in unix time.
use hifitime::{Epoch, Unit};

use crate::{
    constants::{
        Degree, JulianDay, ModifiedJulianDay, UnixTime, ARCSEC_PER_DEGREE, SECONDS_PER_DAY,
        UNIX_EPOCH_JD,
    },
    exarata_errors::ExarataError,
};

fn calendar_epoch(year: i32, month: u8, day: u8) -> Result<Epoch, ExarataError> {
    Epoch::maybe_from_gregorian_utc(year, month, day, 0, 0, 0, 0)
        .map_err(|err| ExarataError::TimeError(format!("{year}-{month}-{day}: {err}")))
}

/// Convert a calendar date with a fractional day into a Julian day.
///
/// Arguments
/// -----------------
/// * `year`, `month`: calendar year and month (1-12).
/// * `day`: day of the month, the fractional part being the time of day.
///
/// Return
/// ----------
/// * The UTC Julian day, or [`ExarataError::TimeError`] for an invalid date.
pub fn decimal_day_to_julian_day(year: i32, month: u8, day: f64) -> Result<JulianDay, ExarataError> {
    let whole_day = day.trunc();
    let epoch = calendar_epoch(year, month, whole_day as u8)?;
    let epoch = epoch + Unit::Day * (day - whole_day);
    Ok(epoch.to_jde_utc_days())
}

/// Convert a full calendar date and time of day into a Julian day.
pub fn full_date_to_julian_day(
    year: i32,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: f64,
) -> Result<JulianDay, ExarataError> {
    let epoch = calendar_epoch(year, month, day)?;
    let offset = Unit::Hour * i64::from(hour) + Unit::Minute * i64::from(minute) + Unit::Second * second;
    Ok((epoch + offset).to_jde_utc_days())
}

/// Convert a Julian day into `(year, month, fractional day)`.
pub fn julian_day_to_decimal_day(jd: JulianDay) -> (i32, u8, f64) {
    let (year, month, day, hour, minute, second, nanos) = Epoch::from_jde_utc(jd).to_gregorian_utc();
    let seconds_of_day = f64::from(hour) * 3600.0
        + f64::from(minute) * 60.0
        + f64::from(second)
        + f64::from(nanos) * 1e-9;
    (year, month, f64::from(day) + seconds_of_day / SECONDS_PER_DAY)
}

/// Convert a Julian day into `(year, month, day, hour, minute, second)`.
pub fn julian_day_to_full_date(jd: JulianDay) -> (i32, u8, u8, u8, u8, f64) {
    let (year, month, day, hour, minute, second, nanos) = Epoch::from_jde_utc(jd).to_gregorian_utc();
    (year, month, day, hour, minute, f64::from(second) + f64::from(nanos) * 1e-9)
}

pub fn modified_julian_day_to_julian_day(mjd: ModifiedJulianDay) -> JulianDay {
    Epoch::from_mjd_utc(mjd).to_jde_utc_days()
}

pub fn julian_day_to_modified_julian_day(jd: JulianDay) -> ModifiedJulianDay {
    Epoch::from_jde_utc(jd).to_mjd_utc_days()
}

/// Julian day → seconds since the unix epoch, leap seconds ignored as unix time does.
pub fn julian_day_to_unix_time(jd: JulianDay) -> UnixTime {
    (jd - UNIX_EPOCH_JD) * SECONDS_PER_DAY
}

pub fn unix_time_to_julian_day(unix_time: UnixTime) -> JulianDay {
    unix_time / SECONDS_PER_DAY + UNIX_EPOCH_JD
}

/// The current time as a Julian day.
pub fn current_utc_to_julian_day() -> Result<JulianDay, ExarataError> {
    Epoch::now()
        .map(|now| now.to_jde_utc_days())
        .map_err(|err| ExarataError::TimeError(err.to_string()))
}

/// Format RA/Dec in degrees as `HH:MM:SS.ss` / `+DD:MM:SS.ss` strings.
///
/// `precision` is the number of decimals on the seconds. Rounding carries into
/// minutes and hours, so `59.999` never prints as `60`.
pub fn degrees_to_sexagesimal_ra_dec(ra: Degree, dec: Degree, precision: usize) -> (String, String) {
    let ra_hours = ra.rem_euclid(360.0) / 15.0;
    let (h, m, s) = split_sexagesimal(ra_hours, precision);
    let width = if precision == 0 { 2 } else { precision + 3 };
    let ra_str = format!("{:02}:{:02}:{:0width$.precision$}", h % 24, m, s);

    let sign = if dec < 0.0 { '-' } else { '+' };
    let (d, m, s) = split_sexagesimal(dec.abs(), precision);
    let dec_str = format!("{sign}{d:02}:{m:02}:{s:0width$.precision$}");
    (ra_str, dec_str)
}

fn split_sexagesimal(value: f64, precision: usize) -> (u32, u32, f64) {
    let scale = 10f64.powi(precision as i32);
    let total_seconds = (value * 3600.0 * scale).round() / scale;
    let whole = total_seconds.trunc() as u64;
    let fraction = total_seconds - whole as f64;
    let units = (whole / 3600) as u32;
    let minutes = ((whole % 3600) / 60) as u32;
    let seconds = (whole % 60) as f64 + fraction;
    (units, minutes, seconds)
}

fn sexagesimal_parts(value: &str) -> Option<(bool, f64, f64, f64)> {
    let parts: Vec<&str> = value
        .split(|c: char| c == ':' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 {
        return None;
    }
    let negative = parts[0].starts_with('-');
    let a: f64 = parts[0].trim_start_matches(['-', '+']).parse().ok()?;
    let b: f64 = parts[1].parse().ok()?;
    let c: f64 = parts[2].parse().ok()?;
    Some((negative, a, b, c))
}

/// Parse sexagesimal RA (`HH MM SS.ss`) and Dec (`±DD MM SS.s`) into degrees.
///
/// Both `:` and whitespace separators are accepted.
pub fn sexagesimal_ra_dec_to_degrees(ra: &str, dec: &str) -> Result<(Degree, Degree), ExarataError> {
    let (_, h, m, s) = sexagesimal_parts(ra)
        .ok_or_else(|| ExarataError::Input(format!("Invalid sexagesimal right ascension: `{ra}`")))?;
    let (negative, d, dm, ds) = sexagesimal_parts(dec)
        .ok_or_else(|| ExarataError::Input(format!("Invalid sexagesimal declination: `{dec}`")))?;

    let ra_deg = (h + m / 60.0 + s / 3600.0) * 15.0;
    let sign = if negative { -1.0 } else { 1.0 };
    let dec_deg = sign * (d + dm / 60.0 + ds / 3600.0);
    Ok((ra_deg, dec_deg))
}

pub fn degrees_per_second_to_arcsec_per_second(degrees_per_second: f64) -> f64 {
    degrees_per_second * ARCSEC_PER_DEGREE
}

/// Month name (full or three letter, any case) → month number.
pub fn string_month_to_number(month: &str) -> Result<u8, ExarataError> {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    let lower = month.trim().to_lowercase();
    MONTHS
        .iter()
        .position(|name| *name == lower || (lower.len() == 3 && name.starts_with(&lower)))
        .map(|index| index as u8 + 1)
        .ok_or_else(|| ExarataError::Input(format!("`{month}` is not a month name")))
}

/// Map the filter wheel header string of an Opihi image to its one letter filter name.
///
/// Blank positions map to `b`, the two open positions to `1`/`2`, clear to `c`
/// and the Sloan filters to their letter.
pub fn filter_header_string_to_filter_name(header_string: &str) -> Result<String, ExarataError> {
    let lower = header_string.trim().to_lowercase();
    let name = match lower.as_str() {
        "0" | "blank" => "b",
        "open2" => "2",
        "open" | "open1" => "1",
        "clear" => "c",
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.all(|c| !c.is_ascii_alphabetic())) {
                (Some(letter @ ('g' | 'r' | 'i' | 'z')), true) => return Ok(letter.to_string()),
                _ => {
                    return Err(ExarataError::Input(format!(
                        "The filter header string `{header_string}` does not name a known filter"
                    )))
                }
            }
        }
    };
    Ok(name.to_string())
}

#[cfg(test)]
mod conversion_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_decimal_day_to_julian_day() {
        assert_relative_eq!(decimal_day_to_julian_day(1858, 11, 16.5).unwrap(), 2400000.0, epsilon = 1e-8);
        assert_relative_eq!(
            decimal_day_to_julian_day(2001, 9, 11.543773148).unwrap(),
            2452164.043773148,
            epsilon = 1e-7
        );
        assert!(decimal_day_to_julian_day(2001, 13, 1.0).is_err());
    }

    #[test]
    fn test_full_date_to_julian_day() {
        assert_relative_eq!(full_date_to_julian_day(1858, 11, 16, 12, 0, 0.0).unwrap(), 2400000.0, epsilon = 1e-8);
        assert_relative_eq!(
            full_date_to_julian_day(2001, 9, 11, 12, 46, 40.0).unwrap(),
            2452164.0324074,
            epsilon = 1e-7
        );
    }

    #[test]
    fn test_julian_day_to_calendar() {
        let (year, month, day) = julian_day_to_decimal_day(2452164.043773148);
        assert_eq!((year, month), (2001, 9));
        assert_relative_eq!(day, 11.543773148, epsilon = 1e-6);

        let (year, month, day, hour, minute, second) = julian_day_to_full_date(2400000.0);
        assert_eq!((year, month, day, hour, minute), (1858, 11, 16, 12, 0));
        assert_relative_eq!(second, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_mjd_and_unix() {
        assert_relative_eq!(modified_julian_day_to_julian_day(0.0), 2400000.5, epsilon = 1e-9);
        assert_relative_eq!(julian_day_to_modified_julian_day(2459000.5), 59000.0, epsilon = 1e-9);
        assert_relative_eq!(julian_day_to_unix_time(2440587.5), 0.0);
        assert_relative_eq!(unix_time_to_julian_day(86400.0), 2440588.5);
    }

    #[test]
    fn test_sexagesimal() {
        let (ra, dec) = degrees_to_sexagesimal_ra_dec(343.097375, -0.5039444444444444, 2);
        assert_eq!(ra, "22:52:23.37");
        assert_eq!(dec, "-00:30:14.20");

        let (ra_deg, dec_deg) = sexagesimal_ra_dec_to_degrees("22 52 23.37", "-00:30:14.2").unwrap();
        assert_relative_eq!(ra_deg, 343.097375, epsilon = 1e-9);
        assert_relative_eq!(dec_deg, -0.5039444444444444, epsilon = 1e-9);

        let (ra, _) = degrees_to_sexagesimal_ra_dec(359.99999999, 0.0, 2);
        assert_eq!(ra, "00:00:00.00");

        assert!(sexagesimal_ra_dec_to_degrees("1 2", "3 4 5").is_err());
    }

    #[test]
    fn test_months_and_filters() {
        assert_eq!(string_month_to_number("January").unwrap(), 1);
        assert_eq!(string_month_to_number("sep").unwrap(), 9);
        assert!(string_month_to_number("Smarch").is_err());

        assert_eq!(filter_header_string_to_filter_name("0").unwrap(), "b");
        assert_eq!(filter_header_string_to_filter_name("open2").unwrap(), "2");
        assert_eq!(filter_header_string_to_filter_name("open").unwrap(), "1");
        assert_eq!(filter_header_string_to_filter_name("r'").unwrap(), "r");
        assert_eq!(filter_header_string_to_filter_name("z").unwrap(), "z");
        assert_eq!(filter_header_string_to_filter_name("Clear").unwrap(), "c");
        assert!(filter_header_string_to_filter_name("halpha").is_err());
    }

    #[test]
    fn test_rate_conversion() {
        assert_relative_eq!(degrees_per_second_to_arcsec_per_second(1.0 / 3600.0), 1.0);
    }
}
