//! # Configuration
//!
//! [`ExarataConfig`] is the single, immutable configuration value of the crate.
//! It is built once at startup and handed by reference to every engine and
//! solution which needs a tunable parameter; nothing reads configuration from
//! a global.
//!
//! ## Layering
//!
//! ```text
//! built-in defaults  →  configuration file  →  secrets file
//! ```
//!
//! Each layer overrides the keys it names. Files are **flat** TOML documents:
//! any nested table is rejected with [`ExarataError::Configuration`]. Keys are
//! case-insensitive; they are upper-cased before being applied. Unknown keys
//! are reported with a warning and ignored.
//!
//! ## Templates
//!
//! [`generate_configuration_file_copy`] and [`generate_secrets_file_copy`]
//! write commented templates that a user can edit.
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{exarata_errors::ExarataError, pathname};

const CONFIGURATION_EXTENSION: &str = "toml";

const DEFAULT_CONFIGURATION_TEMPLATE: &str = include_str!("../templates/configuration.toml");

const DEFAULT_SECRETS_TEMPLATE: &str = include_str!("../templates/secrets.toml");

/// Every tunable parameter of OpihiExarata.
///
/// Field names mirror the configuration keys, e.g. `mpc_observatory_code`
/// is read from `MPC_OBSERVATORY_CODE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ExarataConfig {
    pub mpc_observatory_code: String,
    pub temporary_directory: String,

    pub api_connection_request_sleep_seconds: f64,
    pub api_connection_maximum_attempts: u32,
    pub api_connection_enable_ssl_checks: bool,

    pub astrometry_webapi_job_queue_timeout: f64,

    pub photometry_maximum_intersection_separation: f64,
    pub photometry_star_radius_arcsecond: f64,
    pub photometry_science_radius_mask_pixels: f64,
    pub photometry_edge_width_mask_pixels: usize,
    pub photometry_minimum_filter_observations: u32,
    pub panstarrs_mast_api_data_release_version: u32,
    pub panstarrs_mast_api_maximum_data_rows: u32,

    pub orbfit_directory: String,
    pub orbfit_binary_executable_directory: String,
    pub orbfit_maximum_linear_error: f64,
    pub orbfit_maximum_angular_error: f64,

    pub opihisolution_propagation_observation_expiration_hours: f64,

    pub jpl_horizons_query_span_days: f64,
    pub jpl_horizons_query_timestep_seconds: f64,

    pub secret_astrometrynet_web_api_key: String,
}

impl Default for ExarataConfig {
    fn default() -> Self {
        ExarataConfig {
            mpc_observatory_code: "568".to_string(),
            temporary_directory: default_temporary_directory().into_string(),
            api_connection_request_sleep_seconds: 5.0,
            api_connection_maximum_attempts: 20,
            api_connection_enable_ssl_checks: true,
            astrometry_webapi_job_queue_timeout: 300.0,
            photometry_maximum_intersection_separation: 1.0,
            photometry_star_radius_arcsecond: 3.0,
            photometry_science_radius_mask_pixels: 50.0,
            photometry_edge_width_mask_pixels: 25,
            photometry_minimum_filter_observations: 1,
            panstarrs_mast_api_data_release_version: 2,
            panstarrs_mast_api_maximum_data_rows: 10000,
            orbfit_directory: String::new(),
            orbfit_binary_executable_directory: String::new(),
            orbfit_maximum_linear_error: 0.1,
            orbfit_maximum_angular_error: 0.1,
            opihisolution_propagation_observation_expiration_hours: 12.0,
            jpl_horizons_query_span_days: 2.0,
            jpl_horizons_query_timestep_seconds: 600.0,
            secret_astrometrynet_web_api_key: String::new(),
        }
    }
}

fn default_temporary_directory() -> Utf8PathBuf {
    let base = BaseDirs::new()
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir);
    let base = Utf8PathBuf::from_path_buf(base)
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    base.join("opihiexarata").join("tmp")
}

impl ExarataConfig {
    /// Build the configuration from the defaults and optional files.
    ///
    /// Arguments
    /// -----------------
    /// * `configuration`: optional path of a flat TOML configuration file.
    /// * `secrets`: optional path of a flat TOML secrets file, applied last.
    ///
    /// Return
    /// ----------
    /// * The merged configuration, or the first file/format error met.
    pub fn from_files(
        configuration: Option<&Utf8Path>,
        secrets: Option<&Utf8Path>,
    ) -> Result<Self, ExarataError> {
        let mut merged = match toml::Value::try_from(ExarataConfig::default()) {
            Ok(toml::Value::Table(table)) => table,
            Ok(_) | Err(_) => {
                return Err(ExarataError::Configuration(
                    "The default configuration cannot be represented as a flat table".into(),
                ))
            }
        };

        for path in [configuration, secrets].into_iter().flatten() {
            let layer = load_configuration_file(path)?;
            for (key, value) in layer {
                if merged.contains_key(&key) {
                    debug!(key = %key, file = %path, "configuration key applied");
                    merged.insert(key, value);
                } else {
                    warn!(key = %key, file = %path, "unknown configuration key ignored");
                }
            }
        }

        toml::Value::Table(merged)
            .try_into::<ExarataConfig>()
            .map_err(|err| ExarataError::Configuration(err.to_string()))
    }

    /// The temporary directory as a path.
    pub fn temporary_directory(&self) -> &Utf8Path {
        Utf8Path::new(&self.temporary_directory)
    }
}

/// Load a flat TOML configuration file, with its keys upper-cased.
///
/// Return
/// ----------
/// * The key/value table, [`ExarataError::File`] when the file is missing or
///   does not have a `.toml` extension, [`ExarataError::Configuration`] when a
///   value is itself a table.
pub fn load_configuration_file(path: &Utf8Path) -> Result<toml::Table, ExarataError> {
    if pathname::get_file_extension(path.as_str()) != CONFIGURATION_EXTENSION {
        return Err(ExarataError::File(format!(
            "Configuration file does not have the proper extension, it should be a toml file: {path}"
        )));
    }
    if !path.is_file() {
        return Err(ExarataError::File(format!(
            "The following configuration filename does not exist: {path}"
        )));
    }

    let content = fs::read_to_string(path)?;
    let table: toml::Table = content.parse()?;

    let mut flat = toml::Table::new();
    for (key, value) in table {
        if is_nested(&value) {
            return Err(ExarataError::Configuration(format!(
                "The configuration file should be flat, `{key}` is a nested table. \
                 Please use the configuration file templates."
            )));
        }
        flat.insert(key.to_uppercase(), value);
    }
    Ok(flat)
}

fn is_nested(value: &toml::Value) -> bool {
    match value {
        toml::Value::Table(_) => true,
        toml::Value::Array(items) => items.iter().any(is_nested),
        _ => false,
    }
}

/// Write a copy of the default configuration file.
///
/// A `.toml` extension is appended if the given filename lacks it. An existing
/// file is only replaced when `overwrite` is set.
pub fn generate_configuration_file_copy(
    filename: &Utf8Path,
    overwrite: bool,
) -> Result<Utf8PathBuf, ExarataError> {
    write_template(filename, DEFAULT_CONFIGURATION_TEMPLATE, overwrite)
}

/// Write a copy of the default secrets file, same rules as
/// [`generate_configuration_file_copy`].
pub fn generate_secrets_file_copy(
    filename: &Utf8Path,
    overwrite: bool,
) -> Result<Utf8PathBuf, ExarataError> {
    write_template(filename, DEFAULT_SECRETS_TEMPLATE, overwrite)
}

fn write_template(
    filename: &Utf8Path,
    template: &str,
    overwrite: bool,
) -> Result<Utf8PathBuf, ExarataError> {
    let destination = if pathname::get_file_extension(filename.as_str()) == CONFIGURATION_EXTENSION {
        filename.to_path_buf()
    } else {
        Utf8PathBuf::from(format!("{filename}.{CONFIGURATION_EXTENSION}"))
    };

    if destination.exists() && !overwrite {
        return Err(ExarataError::File(format!(
            "Filename already exists, overwrite is False: {destination}"
        )));
    }
    if let Some(parent) = destination.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&destination, template)?;
    Ok(destination)
}

#[cfg(test)]
mod config_test {
    use super::*;

    fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_templates_match_defaults() {
        let (_guard, dir) = utf8_tempdir();
        let config_path = generate_configuration_file_copy(&dir.join("config"), false).unwrap();
        assert_eq!(config_path.extension(), Some("toml"));
        let config = ExarataConfig::from_files(Some(&config_path), None).unwrap();
        let defaults = ExarataConfig::default();
        assert_eq!(config, defaults);
    }

    #[test]
    fn test_layers_and_case_insensitive_keys() {
        let (_guard, dir) = utf8_tempdir();
        let config_path = dir.join("config.toml");
        let secrets_path = dir.join("secrets.toml");
        fs::write(
            &config_path,
            "mpc_observatory_code = \"T12\"\nApi_Connection_Maximum_Attempts = 3\nNOT_A_KEY = 1\n",
        )
        .unwrap();
        fs::write(&secrets_path, "SECRET_ASTROMETRYNET_WEB_API_KEY = \"abc\"\n").unwrap();

        let config = ExarataConfig::from_files(Some(&config_path), Some(&secrets_path)).unwrap();
        assert_eq!(config.mpc_observatory_code, "T12");
        assert_eq!(config.api_connection_maximum_attempts, 3);
        assert_eq!(config.secret_astrometrynet_web_api_key, "abc");
        assert_eq!(config.photometry_edge_width_mask_pixels, 25);
    }

    #[test]
    fn test_nested_configuration_rejected() {
        let (_guard, dir) = utf8_tempdir();
        let path = dir.join("nested.toml");
        fs::write(&path, "[photometry]\nSTAR_RADIUS = 3.0\n").unwrap();
        let result = load_configuration_file(&path);
        assert!(matches!(result, Err(ExarataError::Configuration(_))));
    }

    #[test]
    fn test_bad_extension_and_missing_file() {
        let (_guard, dir) = utf8_tempdir();
        let yaml = dir.join("config.yaml");
        fs::write(&yaml, "A: 1").unwrap();
        assert!(matches!(load_configuration_file(&yaml), Err(ExarataError::File(_))));
        assert!(matches!(
            load_configuration_file(&dir.join("missing.toml")),
            Err(ExarataError::File(_))
        ));
    }

    #[test]
    fn test_wrong_value_type() {
        let (_guard, dir) = utf8_tempdir();
        let path = dir.join("config.toml");
        fs::write(&path, "API_CONNECTION_MAXIMUM_ATTEMPTS = \"many\"\n").unwrap();
        let result = ExarataConfig::from_files(Some(&path), None);
        assert!(matches!(result, Err(ExarataError::Configuration(_))));
    }

    #[test]
    fn test_generate_without_overwrite() {
        let (_guard, dir) = utf8_tempdir();
        let path = dir.join("secrets.toml");
        generate_secrets_file_copy(&path, false).unwrap();
        assert!(matches!(
            generate_secrets_file_copy(&path, false),
            Err(ExarataError::File(_))
        ));
        assert!(generate_secrets_file_copy(&path, true).is_ok());
    }
}
