use std::fs;

use camino::Utf8PathBuf;
use opihiexarata::{
    config::{generate_configuration_file_copy, generate_secrets_file_copy, ExarataConfig},
    exarata_errors::ExarataError,
};

#[test]
fn generated_files_load_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

    let configuration = generate_configuration_file_copy(&root.join("exarata"), false).unwrap();
    let secrets = generate_secrets_file_copy(&root.join("secrets.toml"), false).unwrap();
    assert_eq!(configuration, root.join("exarata.toml"));
    assert_eq!(secrets, root.join("secrets.toml"));

    let config = ExarataConfig::from_files(Some(&configuration), Some(&secrets)).unwrap();
    assert_eq!(config, ExarataConfig::default());
}

#[test]
fn secrets_apply_over_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let configuration = root.join("configuration.toml");
    let secrets = root.join("secrets.toml");
    fs::write(&configuration, "mpc_observatory_code = \"T14\"\nSECRET_ASTROMETRYNET_WEB_API_KEY = \"public\"\n")
        .unwrap();
    fs::write(&secrets, "SECRET_ASTROMETRYNET_WEB_API_KEY = \"hidden\"\n").unwrap();

    let config = ExarataConfig::from_files(Some(&configuration), Some(&secrets)).unwrap();
    assert_eq!(config.mpc_observatory_code, "T14");
    assert_eq!(config.secret_astrometrynet_web_api_key, "hidden");
    assert_eq!(config.api_connection_maximum_attempts, 20);
}

#[test]
fn regenerating_requires_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let path = generate_configuration_file_copy(&root.join("configuration.toml"), false).unwrap();
    fs::write(&path, "MPC_OBSERVATORY_CODE = \"T14\"\n").unwrap();

    assert!(matches!(
        generate_configuration_file_copy(&path, false),
        Err(ExarataError::File(_))
    ));
    generate_configuration_file_copy(&path, true).unwrap();
    let config = ExarataConfig::from_files(Some(&path), None).unwrap();
    assert_eq!(config.mpc_observatory_code, "568");
}
