use thiserror::Error;

/// Errors that can occur while uploading to B2
#[derive(Error, Debug)]
pub enum UploadError {
    /// Local file could not be opened
    #[error("could not open the file {path:?}")]
    OpenFile {
        path: String,
        source: std::io::Error,
    },

    /// Reading the local file failed mid-copy
    #[error("could not read the file {path:?}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Bucket does not exist or the credentials cannot see it
    #[error("could not get the bucket {bucket:?}: {message}")]
    Bucket { bucket: String, message: String },

    /// Starting the upload or sending one of its parts failed
    #[error("upload of {key:?} failed: {message}")]
    Part { key: String, message: String },

    /// The object could not be committed
    #[error("could not commit {key:?}: {message}")]
    Commit { key: String, message: String },
}

impl UploadError {
    /// Create a bucket error from an SDK error, pointing at credentials when access is denied
    pub fn from_bucket_error<E: std::fmt::Display>(bucket: &str, error: E) -> Self {
        let error_str = error.to_string();
        let lowered = error_str.to_lowercase();
        let message = if lowered.contains("access denied")
            || lowered.contains("accessdenied")
            || lowered.contains("forbidden")
            || lowered.contains("invalidaccesskeyid")
        {
            format!(
                "{} (check that the keyID/appID pair is valid and allowed to access this bucket)",
                error_str
            )
        } else {
            error_str
        };

        Self::Bucket {
            bucket: bucket.to_string(),
            message,
        }
    }

    pub fn part<E: std::fmt::Display>(key: &str, error: E) -> Self {
        Self::Part {
            key: key.to_string(),
            message: error.to_string(),
        }
    }

    pub fn commit<E: std::fmt::Display>(key: &str, error: E) -> Self {
        Self::Commit {
            key: key.to_string(),
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_error_hint_on_access_denied() {
        let err = UploadError::from_bucket_error("backups", "AccessDenied: Access Denied");
        let msg = err.to_string();
        assert!(msg.starts_with("could not get the bucket \"backups\""));
        assert!(msg.contains("keyID/appID"));

        let err = UploadError::from_bucket_error("backups", "NoSuchBucket");
        assert_eq!(
            err.to_string(),
            "could not get the bucket \"backups\": NoSuchBucket"
        );
    }

    #[test]
    fn test_open_error_names_path() {
        let err = UploadError::OpenFile {
            path: "/tmp/missing.txt".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.to_string(), "could not open the file \"/tmp/missing.txt\"");
    }
}
