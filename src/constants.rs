//! # Constants and type definitions for OpihiExarata
//!
//! This module centralizes the **conversion factors**, **service endpoints** and
//! **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Time and angle conversion factors
//! - Base URLs of the web services the engines talk to
//! - Type aliases giving units to plain `f64` values

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Number of seconds in a day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Conversion factor between Julian Date and Modified Julian Date
pub const JDTOMJD: f64 = 2400000.5;

/// Julian day of the unix epoch (1970-01-01 00:00:00 UTC)
pub const UNIX_EPOCH_JD: f64 = 2440587.5;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds in one degree
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

// -------------------------------------------------------------------------------------------------
// Service endpoints
// -------------------------------------------------------------------------------------------------

/// Base URL of the astrometry.net web API
pub const ASTROMETRY_NET_API_BASE_URL: &str = "http://nova.astrometry.net/api/";

/// Base URL of the astrometry.net result files, `{kind}_file/{job_id}` is appended
pub const ASTROMETRY_NET_FILE_BASE_URL: &str = "http://nova.astrometry.net/";

/// JPL Horizons web API endpoint
pub const JPL_HORIZONS_API_URL: &str = "https://ssd.jpl.nasa.gov/api/horizons.api";

/// PanSTARRS catalog root of the MAST web API
pub const PANSTARRS_MAST_API_BASE_URL: &str = "https://catalogs.mast.stsci.edu/api/v0.1/panstarrs";

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;

/// Angle in arcseconds
pub type ArcSec = f64;

/// Julian day (UTC)
pub type JulianDay = f64;

/// Modified Julian day (UTC)
pub type ModifiedJulianDay = f64;

/// Seconds since the unix epoch
pub type UnixTime = f64;

/// Distance in astronomical units
pub type AstronomicalUnit = f64;

/// Pixel coordinate, zero based
pub type Pixel = f64;
