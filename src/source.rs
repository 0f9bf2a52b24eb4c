use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SourceError {
    /// Source path is missing or unreadable
    #[error("could not read source {path}")]
    Stat {
        path: String,
        source: std::io::Error,
    },

    #[error("could not read files inside directory {path}")]
    List {
        path: String,
        source: walkdir::Error,
    },

    #[error("could not determine the file name of {path}")]
    NoFileName { path: String },

    /// Object keys must be UTF-8
    #[error("file name of {path} is not valid UTF-8")]
    NonUtf8Name { path: String },
}

/// Resolve the source argument into the ordered list of files to upload
///
/// A regular file yields itself. A directory yields its immediate entries in
/// file-name order, without descending and without filtering out
/// sub-directories.
pub fn resolve_sources(src: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let metadata = std::fs::metadata(src).map_err(|source| SourceError::Stat {
        path: src.display().to_string(),
        source,
    })?;

    if !metadata.is_dir() {
        return Ok(vec![src.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(src)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| SourceError::List {
            path: src.display().to_string(),
            source,
        })?;
        files.push(src.join(entry.file_name()));
    }

    Ok(files)
}

/// Destination key for a local file: `{dst}/{base name}`
pub fn object_key(dst: &str, file: &Path) -> Result<String, SourceError> {
    let name = file.file_name().ok_or_else(|| SourceError::NoFileName {
        path: file.display().to_string(),
    })?;
    let name = name.to_str().ok_or_else(|| SourceError::NonUtf8Name {
        path: file.display().to_string(),
    })?;
    Ok(format!("{}/{}", dst, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("onefile.txt");
        fs::write(&file, b"hello").unwrap();

        let files = resolve_sources(&file).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_directory_entries_in_name_order() {
        let dir = TempDir::new().unwrap();
        for name in ["b.txt", "c.txt", "a.txt"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let files = resolve_sources(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("a.txt"),
                dir.path().join("b.txt"),
                dir.path().join("c.txt"),
            ]
        );
    }

    #[test]
    fn test_directory_is_not_recursive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.txt"), "deep").unwrap();

        // The sub-directory is listed as an entry, its contents are not
        let files = resolve_sources(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.txt"), dir.path().join("nested")]
        );
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_sources(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        let err = resolve_sources(&missing).unwrap_err();
        assert!(matches!(err, SourceError::Stat { .. }));
        assert!(err.to_string().starts_with("could not read source"));
    }

    #[test]
    fn test_object_key() {
        assert_eq!(
            object_key("backup", Path::new("/tmp/onefile.txt")).unwrap(),
            "backup/onefile.txt"
        );
        assert_eq!(
            object_key("backup", Path::new("/tmp/dir/a.txt")).unwrap(),
            "backup/a.txt"
        );
        assert_eq!(
            object_key("a/b", Path::new("relative.bin")).unwrap(),
            "a/b/relative.bin"
        );
        assert!(object_key("backup", Path::new("..")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_object_key_rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let first = Path::new("/tmp").join(OsStr::from_bytes(b"caf\xe9.txt"));
        let second = Path::new("/tmp").join(OsStr::from_bytes(b"caf\xff.txt"));

        for file in [first, second] {
            let err = object_key("backup", &file).unwrap_err();
            assert!(matches!(err, SourceError::NonUtf8Name { .. }));
        }
    }
}
