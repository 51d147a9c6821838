//! Error types for provider requests.
//!
//! Every search and retrieval failure is mapped into a [`ProviderError`] so
//! the retry classifier and the engine can reason about it without knowing
//! the transport.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the search and retrieval primitives.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level error (DNS resolution, connection refused, TLS, broken stream).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP status other than an authentication rejection.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The provider rejected the authentication token.
    #[error("[AUTH] token rejected (HTTP {status}) requesting {url}")]
    AuthRejected {
        /// The URL that was refused.
        url: String,
        /// 401 or 403.
        status: u16,
    },

    /// Local file system error while writing a retrieved asset.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A URL could not be built or parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The provider answered with a body this client cannot interpret.
    #[error("invalid response from {url}: {message}")]
    InvalidResponse {
        /// The URL that produced the response.
        url: String,
        /// What was wrong with it.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl ProviderError {
    /// Creates a network error, promoting reqwest timeouts to [`Self::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates an authentication rejection.
    pub fn auth_rejected(url: impl Into<String>, status: u16) -> Self {
        Self::AuthRejected {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns whether the token was rejected.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::AuthRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display() {
        let error = ProviderError::http_status("https://freesound.org/apiv2/sounds/1/download/", 503);
        assert_eq!(
            error.to_string(),
            "HTTP 503 requesting https://freesound.org/apiv2/sounds/1/download/"
        );
    }

    #[test]
    fn test_auth_rejected_is_flagged() {
        let error = ProviderError::auth_rejected("https://freesound.org/apiv2/search/text/", 401);
        assert!(error.is_auth_rejection());
        assert!(error.to_string().contains("[AUTH]"));
        assert!(!ProviderError::timeout("x").is_auth_rejection());
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = ProviderError::io("/tmp/x.wav", io_err);
        assert!(error.source().is_some());
        assert!(error.to_string().contains("/tmp/x.wav"));
    }
}
