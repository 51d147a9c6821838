//! Error types for the download module.
//!
//! Only conditions that must stop the whole run are errors here. Per-asset
//! failures (exhausted retries, permanent HTTP errors, throttle exhaustion)
//! are reported as [`DownloadStatus::Failed`](super::DownloadStatus::Failed)
//! outcomes instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ProviderError;

/// Fatal errors raised while fetching an asset.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The target directory does not exist.
    #[error("target directory {path} does not exist")]
    MissingTargetDir {
        /// The configured directory.
        path: PathBuf,
    },

    /// The target path exists but is not a directory.
    #[error("target path {path} is not a directory")]
    NotADirectory {
        /// The configured path.
        path: PathBuf,
    },

    /// The target directory could not be inspected.
    #[error("cannot access target directory {path}: {source}")]
    TargetDirAccess {
        /// The configured directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The target directory exists but files cannot be created in it.
    #[error("target directory {path} is not writable: {source}")]
    TargetDirNotWritable {
        /// The configured directory.
        path: PathBuf,
        /// The error from the write check.
        #[source]
        source: std::io::Error,
    },

    /// The provider rejected the token; retrying cannot help.
    #[error("[AUTH] provider rejected the access token: {source}")]
    AuthRejected {
        /// The rejection as reported by the provider.
        #[source]
        source: ProviderError,
    },
}

impl DownloadError {
    /// Creates a missing target directory error.
    pub fn missing_target_dir(path: impl Into<PathBuf>) -> Self {
        Self::MissingTargetDir { path: path.into() }
    }

    /// Creates a not-a-directory error.
    pub fn not_a_directory(path: impl Into<PathBuf>) -> Self {
        Self::NotADirectory { path: path.into() }
    }

    /// Returns whether this is an authentication rejection.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::AuthRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_target_dir_display() {
        let error = DownloadError::missing_target_dir("/nope");
        assert_eq!(error.to_string(), "target directory /nope does not exist");
    }

    #[test]
    fn test_not_writable_display() {
        let error = DownloadError::TargetDirNotWritable {
            path: "/proc".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(error.to_string().starts_with("target directory /proc is not writable"));
    }

    #[test]
    fn test_auth_rejected_keeps_provider_error() {
        use std::error::Error as _;
        let error = DownloadError::AuthRejected {
            source: ProviderError::auth_rejected("https://freesound.org/apiv2/sounds/1/download/", 401),
        };
        assert!(error.is_auth_rejection());
        assert!(error.source().is_some());
        assert!(error.to_string().starts_with("[AUTH]"));
    }
}
