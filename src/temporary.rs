//! Scratch directory for downloaded results and engine working files.
use std::fs;

use camino::Utf8PathBuf;
use tracing::debug;

use crate::{config::ExarataConfig, exarata_errors::ExarataError};

/// Create the configured temporary directory (and its parents) if missing.
pub fn make_temporary_directory(config: &ExarataConfig) -> Result<Utf8PathBuf, ExarataError> {
    let directory = config.temporary_directory().to_path_buf();
    if !directory.is_dir() {
        debug!(directory = %directory, "creating temporary directory");
        fs::create_dir_all(&directory)?;
    }
    Ok(directory)
}

/// Path of a file inside the temporary directory, creating the directory first.
pub fn make_temporary_directory_path(
    config: &ExarataConfig,
    filename: &str,
) -> Result<Utf8PathBuf, ExarataError> {
    Ok(make_temporary_directory(config)?.join(filename))
}

/// Remove the temporary directory and everything in it. A missing directory is fine.
pub fn delete_temporary_directory(config: &ExarataConfig) -> Result<(), ExarataError> {
    let directory = config.temporary_directory();
    if directory.is_dir() {
        debug!(directory = %directory, "deleting temporary directory");
        fs::remove_dir_all(directory)?;
    }
    Ok(())
}

#[cfg(test)]
mod temporary_test {
    use super::*;

    #[test]
    fn test_make_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let config = ExarataConfig {
            temporary_directory: root.join("nested").join("tmp").into_string(),
            ..ExarataConfig::default()
        };

        let path = make_temporary_directory_path(&config, "corr.fits").unwrap();
        assert_eq!(path, root.join("nested/tmp/corr.fits"));
        assert!(root.join("nested/tmp").is_dir());

        fs::write(&path, b"x").unwrap();
        delete_temporary_directory(&config).unwrap();
        assert!(!root.join("nested/tmp").exists());
        delete_temporary_directory(&config).unwrap();
    }
}
