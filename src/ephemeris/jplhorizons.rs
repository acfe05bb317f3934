//! JPL Horizons observer ephemerides for a small body given by its elements.
//!
//! The query uses `CSV_FORMAT=YES`, `CAL_FORMAT=JD` and `ANG_FORMAT=DEG`. Each
//! row between `$$SOE` and `$$EOE` then reads
//!
//! ```text
//! JD, solar flag, lunar flag, RA, DEC, dRA*cosD, dDEC/dt, ...
//! ```
//!
//! with the rates in arcseconds per hour.
use regex::Regex;
use tracing::{debug, info};

use crate::{
    constants::{JulianDay, JPL_HORIZONS_API_URL},
    engine::{EngineDomain, ExarataEngine},
    exarata_errors::ExarataError,
    http::ExarataHttp,
    orbit::OrbitalElements,
    table::ColumnTable,
};

/// Columns of an ephemeris table; rates are in arcseconds per hour.
pub const EPHEMERIS_COLUMNS: [&str; 5] = ["julian_day", "ra", "dec", "ra_rate", "dec_rate"];

const ROW_JULIAN_DAY: usize = 0;
const ROW_RA: usize = 3;
const ROW_DEC: usize = 4;
const ROW_RA_RATE: usize = 5;
const ROW_DEC_RATE: usize = 6;

#[derive(Debug, Clone)]
pub struct JplHorizonsWebApi {
    http: ExarataHttp,
    elements: OrbitalElements,
    epoch_julian_day: JulianDay,
    observatory_code: String,
}

impl ExarataEngine for JplHorizonsWebApi {
    fn domain(&self) -> EngineDomain {
        EngineDomain::Ephemeris
    }

    fn name(&self) -> String {
        "JplHorizonsWebApi".into()
    }
}

impl JplHorizonsWebApi {
    /// Arguments
    /// -----------------
    /// * `elements`: heliocentric ecliptic J2000 elements, AU and degrees.
    /// * `epoch_julian_day`: osculating epoch of the elements.
    /// * `observatory_code`: MPC code of the observer on Earth.
    pub fn new(
        http: &ExarataHttp,
        elements: OrbitalElements,
        epoch_julian_day: JulianDay,
        observatory_code: &str,
    ) -> Self {
        JplHorizonsWebApi {
            http: http.clone(),
            elements,
            epoch_julian_day,
            observatory_code: observatory_code.to_string(),
        }
    }

    fn query_parameters(&self, start: JulianDay, stop: JulianDay, step_seconds: f64) -> Vec<(&'static str, String)> {
        // Horizons steps are whole minutes
        let step_minutes = ((step_seconds / 60.0) as i64).max(1);
        let e = &self.elements;
        vec![
            ("OBJECT", "OpihiExarata-Small-Body".to_string()),
            ("CENTER", format!("{}@399", self.observatory_code)),
            ("COMMAND", ";".to_string()),
            ("EPHEM_TYPE", "OBSERVER".to_string()),
            ("A", e.semimajor_axis.to_string()),
            ("EC", e.eccentricity.to_string()),
            ("IN", e.inclination.to_string()),
            ("OM", e.longitude_ascending_node.to_string()),
            ("W", e.argument_perihelion.to_string()),
            ("MA", e.mean_anomaly.to_string()),
            ("EPOCH", self.epoch_julian_day.to_string()),
            ("ECLIP", "J2000".to_string()),
            ("START_TIME", format!("JD{start}")),
            ("STOP_TIME", format!("JD{stop}")),
            ("STEP_SIZE", format!("{step_minutes}m")),
            ("QUANTITIES", "1,3,41,47".to_string()),
            ("CAL_FORMAT", "JD".to_string()),
            ("ANG_FORMAT", "DEG".to_string()),
            ("CSV_FORMAT", "YES".to_string()),
            ("format", "text".to_string()),
        ]
    }

    /// Tabulate the ephemeris between two Julian days.
    ///
    /// Return
    /// ----------
    /// * A table with [`EPHEMERIS_COLUMNS`], or [`ExarataError::WebRequest`]
    ///   when Horizons answers with an error or without ephemeris rows.
    pub fn query_ephemeris(
        &self,
        start: JulianDay,
        stop: JulianDay,
        step_seconds: f64,
    ) -> Result<ColumnTable, ExarataError> {
        if stop <= start {
            return Err(ExarataError::Input(format!(
                "The ephemeris stop time JD{stop} must be after the start time JD{start}"
            )));
        }
        let parameters = self.query_parameters(start, stop, step_seconds);
        let query: Vec<(&str, &str)> = parameters.iter().map(|(k, v)| (*k, v.as_str())).collect();
        debug!(start, stop, step_seconds, "querying JPL Horizons");
        let text = self.http.get_text(JPL_HORIZONS_API_URL, &query)?;
        let table = parse_horizons_ephemeris(&text)?;
        info!(rows = table.len(), "JPL Horizons ephemeris received");
        Ok(table)
    }
}

/// Parse the text answer of the Horizons API.
pub fn parse_horizons_ephemeris(text: &str) -> Result<ColumnTable, ExarataError> {
    let block = Regex::new(r"(?s)\$\$SOE\s*\n(.*?)\$\$EOE").map_err(|err| {
        ExarataError::WebRequest(format!("Cannot build the Horizons block pattern: {err}"))
    })?;
    let Some(rows) = block.captures(text).and_then(|c| c.get(1)) else {
        let reason = text
            .lines()
            .map(str::trim)
            .find(|line| line.contains("ERROR") || line.contains("Cannot"))
            .unwrap_or("no ephemeris block in the response");
        return Err(ExarataError::WebRequest(format!("JPL Horizons returned no ephemeris: {reason}")));
    };

    let mut table = ColumnTable::new(&EPHEMERIS_COLUMNS);
    for line in rows.as_str().lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let number = |index: usize| -> Result<f64, ExarataError> {
            fields
                .get(index)
                .and_then(|field| field.parse::<f64>().ok())
                .ok_or_else(|| ExarataError::WebRequest(format!("Unreadable JPL Horizons ephemeris row `{line}`")))
        };
        table.push_row(&[
            number(ROW_JULIAN_DAY)?,
            number(ROW_RA)?,
            number(ROW_DEC)?,
            number(ROW_RA_RATE)?,
            number(ROW_DEC_RATE)?,
        ])?;
    }
    if table.is_empty() {
        return Err(ExarataError::WebRequest("JPL Horizons returned an empty ephemeris".into()));
    }
    Ok(table)
}

#[cfg(test)]
pub(crate) mod jplhorizons_test {
    use super::*;
    use crate::{config::ExarataConfig, http::CancellationFlag};

    pub(crate) const HORIZONS_RESPONSE: &str = "\
*******************************************************************************
 Date_________JDUT, , ,R.A._(ICRF), DEC__(ICRF), dRA*cosD,d(DEC)/dt, ObsEcLon,ObsEcLat,
*******************************************************************************
$$SOE
2459000.500000000, , , 150.00000, 20.00000, 36.00000, -18.00000, 140.1, 5.2,
2459000.541666667,*, , 150.01000, 19.99500, 36.00000, -18.00000, 140.2, 5.2,
2459000.583333333,*,m, 150.02000, 19.99000, 36.00000, -18.00000, 140.3, 5.2,
$$EOE
*******************************************************************************
";

    #[test]
    fn test_parse_ephemeris_rows() {
        let table = parse_horizons_ephemeris(HORIZONS_RESPONSE).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.value("ra", 1), Some(150.01));
        assert_eq!(table.value("dec_rate", 2), Some(-18.0));
        assert_eq!(table.value("julian_day", 0), Some(2459000.5));
    }

    #[test]
    fn test_error_responses() {
        let error = "API VERSION: 1.2\n ERROR: Cannot interpret date. Type \"?!\" for help.\n";
        assert!(matches!(
            parse_horizons_ephemeris(error),
            Err(ExarataError::WebRequest(m)) if m.contains("Cannot interpret date")
        ));
        assert!(matches!(
            parse_horizons_ephemeris("$$SOE\n2459000.5, , , abc, 1, 2, 3,\n$$EOE\n"),
            Err(ExarataError::WebRequest(_))
        ));
    }

    #[test]
    fn test_query_parameters() {
        let config = ExarataConfig::default();
        let http = ExarataHttp::new(&config, CancellationFlag::new());
        let horizons = JplHorizonsWebApi::new(
            &http,
            OrbitalElements::from_array([2.5, 0.1, 10.0, 50.0, 30.0, 15.0]),
            2459000.5,
            "568",
        );
        let parameters = horizons.query_parameters(2459000.0, 2459001.0, 90.0);
        let get = |key: &str| parameters.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());
        assert_eq!(get("CENTER").as_deref(), Some("568@399"));
        assert_eq!(get("STEP_SIZE").as_deref(), Some("1m"));
        assert_eq!(get("A").as_deref(), Some("2.5"));
        assert_eq!(get("START_TIME").as_deref(), Some("JD2459000"));
        assert_eq!(get("QUANTITIES").as_deref(), Some("1,3,41,47"));
    }

    #[test]
    fn test_cancelled_query_makes_no_request() {
        let config = ExarataConfig::default();
        let flag = CancellationFlag::new();
        flag.cancel();
        let http = ExarataHttp::new(&config, flag);
        let horizons = JplHorizonsWebApi::new(&http, OrbitalElements::nan(), 2459000.5, "568");
        assert_eq!(
            horizons.query_ephemeris(2459000.0, 2459001.0, 600.0),
            Err(ExarataError::Cancelled)
        );
    }
}
