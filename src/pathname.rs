//! Pathname helpers over [`camino`] UTF-8 paths.
//!
//! File extensions are returned without their leading dot. A file name with
//! no dot has an empty extension.
use camino::{Utf8Path, Utf8PathBuf};

/// Directory part of a pathname, empty when there is none.
pub fn get_directory(pathname: &str) -> String {
    Utf8Path::new(pathname)
        .parent()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}

/// File name with its last extension removed.
pub fn get_filename_without_extension(pathname: &str) -> String {
    Utf8Path::new(pathname)
        .file_stem()
        .unwrap_or_default()
        .to_string()
}

/// File name including its extension.
pub fn get_filename_with_extension(pathname: &str) -> String {
    Utf8Path::new(pathname)
        .file_name()
        .unwrap_or_default()
        .to_string()
}

/// Last extension of the file name, without the dot.
pub fn get_file_extension(pathname: &str) -> String {
    Utf8Path::new(pathname)
        .extension()
        .unwrap_or_default()
        .to_string()
}

/// Join directories, a file name and an extension into one pathname.
///
/// Arguments
/// -----------------
/// * `directories`: directory components, joined in order (may be empty).
/// * `filename`: the bare file name.
/// * `extension`: the extension without a dot; nothing is appended when empty.
///
/// Return
/// ----------
/// * The merged pathname.
pub fn merge_pathname<S: AsRef<str>>(directories: &[S], filename: &str, extension: &str) -> String {
    let mut path = Utf8PathBuf::new();
    for directory in directories {
        path.push(directory.as_ref());
    }
    if extension.is_empty() {
        path.push(filename);
    } else {
        path.push(format!("{filename}.{extension}"));
    }
    path.into_string()
}

/// Split a pathname into `(directory, filename, extension)`.
pub fn split_pathname(pathname: &str) -> (String, String, String) {
    (
        get_directory(pathname),
        get_filename_without_extension(pathname),
        get_file_extension(pathname),
    )
}

#[cfg(test)]
mod pathname_test {
    use super::*;

    const VIDEO: &str = "/home/sparrow/Kirby/星のカービィ (2001) - Episode 1 [a9vrQ3Ns0gg].mkv";

    #[test]
    fn test_get_directory() {
        assert_eq!(get_directory(VIDEO), "/home/sparrow/Kirby");
        assert_eq!(get_directory("lonely.txt"), "");
    }

    #[test]
    fn test_get_filenames() {
        assert_eq!(
            get_filename_without_extension(VIDEO),
            "星のカービィ (2001) - Episode 1 [a9vrQ3Ns0gg]"
        );
        assert_eq!(
            get_filename_with_extension(VIDEO),
            "星のカービィ (2001) - Episode 1 [a9vrQ3Ns0gg].mkv"
        );
    }

    #[test]
    fn test_get_file_extension() {
        assert_eq!(get_file_extension(VIDEO), "mkv");
        assert_eq!(get_file_extension("/tmp/archive.tar.gz"), "gz");
        assert_eq!(get_file_extension("/tmp/README"), "");
    }

    #[test]
    fn test_merge_pathname() {
        assert_eq!(
            merge_pathname(&["/home/sparrow/test/wiki"], "docker-compose", "yml"),
            "/home/sparrow/test/wiki/docker-compose.yml"
        );
        assert_eq!(
            merge_pathname(&["/data", "opihi"], "image", "fits"),
            "/data/opihi/image.fits"
        );
        let no_dirs: [&str; 0] = [];
        assert_eq!(merge_pathname(&no_dirs, "plain", ""), "plain");
    }

    #[test]
    fn test_split_pathname() {
        let (directory, filename, extension) =
            split_pathname("/home/sparrow/test/wiki/docker-compose.yml");
        assert_eq!(directory, "/home/sparrow/test/wiki");
        assert_eq!(filename, "docker-compose");
        assert_eq!(extension, "yml");
    }
}
