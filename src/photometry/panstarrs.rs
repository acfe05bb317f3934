//! # PanSTARRS catalog access
//!
//! Cone searches of the PanSTARRS mean object catalog through the MAST
//! catalog API. The response is CSV; PanSTARRS marks missing values with
//! `-999` (or less), which are masked here.
use tracing::debug;

use crate::{
    constants::{Degree, PANSTARRS_MAST_API_BASE_URL},
    engine::{EngineDomain, ExarataEngine},
    exarata_errors::ExarataError,
    http::ExarataHttp,
    table::ColumnTable,
};

/// Every column the MAST PanSTARRS mean catalog serves.
pub const PANSTARRS_AVAILABLE_COLUMNS: [&str; 125] = [
    "objName", "objAltName1", "objAltName2", "objAltName3", "objID", "uniquePspsOBid",
    "ippObjID", "surveyID", "htmID", "zoneID", "tessID", "projectionID", "skyCellID",
    "randomID", "batchID", "dvoRegionID", "processingVersion", "objInfoFlag", "qualityFlag",
    "raStack", "decStack", "raStackErr", "decStackErr", "raMean", "decMean", "raMeanErr",
    "decMeanErr", "epochMean", "posMeanChisq", "cx", "cy", "cz", "lambda", "beta", "l", "b",
    "nStackObjectRows", "nStackDetections", "nDetections", "ng", "nr", "ni", "nz", "ny",
    "gQfPerfect", "gMeanPSFMag", "gMeanPSFMagErr", "gMeanPSFMagStd", "gMeanPSFMagNpt",
    "gMeanPSFMagMin", "gMeanPSFMagMax", "gMeanKronMag", "gMeanKronMagErr", "gMeanKronMagStd",
    "gMeanKronMagNpt", "gMeanApMag", "gMeanApMagErr", "gMeanApMagStd", "gMeanApMagNpt",
    "gFlags", "rQfPerfect", "rMeanPSFMag", "rMeanPSFMagErr", "rMeanPSFMagStd",
    "rMeanPSFMagNpt", "rMeanPSFMagMin", "rMeanPSFMagMax", "rMeanKronMag", "rMeanKronMagErr",
    "rMeanKronMagStd", "rMeanKronMagNpt", "rMeanApMag", "rMeanApMagErr", "rMeanApMagStd",
    "rMeanApMagNpt", "rFlags", "iQfPerfect", "iMeanPSFMag", "iMeanPSFMagErr", "iMeanPSFMagStd",
    "iMeanPSFMagNpt", "iMeanPSFMagMin", "iMeanPSFMagMax", "iMeanKronMag", "iMeanKronMagErr",
    "iMeanKronMagStd", "iMeanKronMagNpt", "iMeanApMag", "iMeanApMagErr", "iMeanApMagStd",
    "iMeanApMagNpt", "iFlags", "zQfPerfect", "zMeanPSFMag", "zMeanPSFMagErr", "zMeanPSFMagStd",
    "zMeanPSFMagNpt", "zMeanPSFMagMin", "zMeanPSFMagMax", "zMeanKronMag", "zMeanKronMagErr",
    "zMeanKronMagStd", "zMeanKronMagNpt", "zMeanApMag", "zMeanApMagErr", "zMeanApMagStd",
    "zMeanApMagNpt", "zFlags", "yQfPerfect", "yMeanPSFMag", "yMeanPSFMagErr", "yMeanPSFMagStd",
    "yMeanPSFMagNpt", "yMeanPSFMagMin", "yMeanPSFMagMax", "yMeanKronMag", "yMeanKronMagErr",
    "yMeanKronMagStd", "yMeanKronMagNpt", "yMeanApMag", "yMeanApMagErr", "yMeanApMagStd",
    "yMeanApMagNpt", "yFlags", "distance",
];

/// Values at or below this are missing data in PanSTARRS.
const PANSTARRS_MASK_VALUE: f64 = -999.0;

/// Parameters of a cone search around a sky position.
#[derive(Debug, Clone, PartialEq)]
pub struct ConeSearch<'a> {
    pub ra: Degree,
    pub dec: Degree,
    pub radius: Degree,
    /// Minimum number of detections of an object.
    pub detections: u32,
    /// Minimum number of detections in each of g, r, i, z.
    pub color_detections: u32,
    /// Requested columns, case-insensitive; all of them when empty.
    pub columns: &'a [&'a str],
    pub max_rows: u32,
    pub data_release: u32,
}

impl Default for ConeSearch<'_> {
    fn default() -> Self {
        ConeSearch {
            ra: 0.0,
            dec: 0.0,
            radius: 0.0,
            detections: 3,
            color_detections: 1,
            columns: &[],
            max_rows: 1000,
            data_release: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanstarrsMastWebApi {
    http: ExarataHttp,
}

impl ExarataEngine for PanstarrsMastWebApi {
    fn domain(&self) -> EngineDomain {
        EngineDomain::Photometry
    }

    fn name(&self) -> String {
        "PanstarrsMastWebApi".into()
    }
}

impl PanstarrsMastWebApi {
    pub fn new(http: &ExarataHttp) -> Self {
        PanstarrsMastWebApi { http: http.clone() }
    }

    /// Query the catalog, returning the masked table with lowercase column names.
    pub fn cone_search(&self, search: &ConeSearch<'_>) -> Result<ColumnTable, ExarataError> {
        let (url, query) = cone_search_request(search)?;
        debug!(ra = search.ra, dec = search.dec, radius = search.radius, "PanSTARRS cone search");
        let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let text = self.http.get_text(&url, &query)?;
        parse_catalog_csv(&text)
    }
}

/// Validate a cone search and build its URL and query parameters.
fn cone_search_request(search: &ConeSearch<'_>) -> Result<(String, Vec<(&'static str, String)>), ExarataError> {
    if !(0.0..=360.0).contains(&search.ra) {
        return Err(ExarataError::Input(format!(
            "The right ascension {} of the cone search must be within [0, 360] degrees",
            search.ra
        )));
    }
    if !(-90.0..=90.0).contains(&search.dec) {
        return Err(ExarataError::Input(format!(
            "The declination {} of the cone search must be within [-90, 90] degrees",
            search.dec
        )));
    }
    if !(0.0..=180.0).contains(&search.radius) {
        return Err(ExarataError::Input(format!(
            "The radius {} of the cone search must be within [0, 180] degrees",
            search.radius
        )));
    }
    if search.detections < 1 {
        return Err(ExarataError::Input("The number of required detections must be at least one".into()));
    }
    if search.max_rows < 1 {
        return Err(ExarataError::Input("The maximum number of rows queried must be at least one".into()));
    }
    if !matches!(search.data_release, 1 | 2) {
        return Err(ExarataError::Input(format!(
            "The PanSTARRS data release {} is not supported, only 1 and 2 are",
            search.data_release
        )));
    }

    let requested: Vec<&str> = if search.columns.is_empty() {
        PANSTARRS_AVAILABLE_COLUMNS.to_vec()
    } else {
        search.columns.to_vec()
    };
    let mut columns = Vec::with_capacity(requested.len());
    for column in requested {
        let lower = column.to_lowercase();
        if !PANSTARRS_AVAILABLE_COLUMNS.iter().any(|known| known.to_lowercase() == lower) {
            return Err(ExarataError::Input(format!(
                "The column `{column}` is not a valid column of the PanSTARRS catalog"
            )));
        }
        columns.push(lower);
    }

    let url = format!("{PANSTARRS_MAST_API_BASE_URL}/dr{}/mean", search.data_release);
    let color = search.color_detections.to_string();
    let query = vec![
        ("ra", search.ra.to_string()),
        ("dec", search.dec.to_string()),
        ("radius", search.radius.to_string()),
        ("nDetections.gte", search.detections.to_string()),
        ("columns", format!("[{}]", columns.join(","))),
        ("pagesize", search.max_rows.to_string()),
        ("ng.gte", color.clone()),
        ("nr.gte", color.clone()),
        ("ni.gte", color.clone()),
        ("nz.gte", color),
        ("format", "csv".to_string()),
    ];
    Ok((url, query))
}

/// Parse a MAST CSV response; non-numeric and missing values are masked.
pub fn parse_catalog_csv(text: &str) -> Result<ColumnTable, ExarataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let names: Vec<String> = reader.headers()?.iter().map(str::to_lowercase).collect();
    let mut table = ColumnTable::new(&names);
    for record in reader.records() {
        let row: Vec<f64> = record?
            .iter()
            .map(|field| match field.parse::<f64>() {
                Ok(value) if value > PANSTARRS_MASK_VALUE => value,
                _ => f64::NAN,
            })
            .collect();
        table.push_row(&row)?;
    }
    Ok(table)
}

#[cfg(test)]
mod panstarrs_test {
    use super::*;

    #[test]
    fn test_cone_search_validation() {
        let good = ConeSearch {
            ra: 150.0,
            dec: 30.0,
            radius: 0.1,
            columns: &["raMean", "DECMEAN"],
            ..Default::default()
        };
        let (url, query) = cone_search_request(&good).unwrap();
        assert_eq!(url, "https://catalogs.mast.stsci.edu/api/v0.1/panstarrs/dr2/mean");
        assert!(query.contains(&("columns", "[ramean,decmean]".to_string())));
        assert!(query.contains(&("nz.gte", "1".to_string())));
        assert!(query.contains(&("format", "csv".to_string())));

        for bad in [
            ConeSearch { ra: 361.0, ..good.clone() },
            ConeSearch { dec: -91.0, ..good.clone() },
            ConeSearch { radius: 181.0, ..good.clone() },
            ConeSearch { detections: 0, ..good.clone() },
            ConeSearch { max_rows: 0, ..good.clone() },
            ConeSearch { data_release: 3, ..good.clone() },
            ConeSearch { columns: &["notAColumn"], ..good.clone() },
        ] {
            assert!(matches!(cone_search_request(&bad), Err(ExarataError::Input(_))));
        }
    }

    #[test]
    fn test_parse_catalog_masks_missing_values() {
        let text = "ramean,decmean,gmeanpsfmag,objName\n\
                    150.01,30.02,17.5,PSO J150\n\
                    150.03,30.04,-999.0,PSO J151\n";
        let table = parse_catalog_csv(text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value("gmeanpsfmag", 0), Some(17.5));
        assert_eq!(table.value("gmeanpsfmag", 1), None);
        assert_eq!(table.value("objname", 0), None);
        assert_eq!(table.value("decmean", 1), Some(30.04));
    }

    #[test]
    #[ignore = "requires network access to MAST"]
    fn test_live_cone_search() {
        let http = ExarataHttp::new(&crate::config::ExarataConfig::default(), Default::default());
        let client = PanstarrsMastWebApi::new(&http);
        let table = client
            .cone_search(&ConeSearch {
                ra: 150.0,
                dec: 30.0,
                radius: 0.05,
                columns: &["raMean", "decMean", "rMeanPSFMag"],
                ..Default::default()
            })
            .unwrap();
        assert!(table.column("ramean").is_some());
    }
}
