//! Error types for the OAuth2 exchange.

use thiserror::Error;

/// Errors raised while obtaining an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user (or callback) produced no authorization code.
    #[error("no authorization code was provided")]
    MissingCode,

    /// The code source failed (for example, the terminal was closed).
    #[error("failed to obtain authorization code: {message}")]
    CodeSource {
        /// What went wrong.
        message: String,
    },

    /// The token endpoint could not be reached.
    #[error("network error contacting token endpoint {url}: {source}")]
    Network {
        /// Token endpoint.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The token endpoint refused the exchange.
    #[error("token exchange rejected (HTTP {status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The token endpoint answered without a usable token.
    #[error("invalid token response: {message}")]
    InvalidResponse {
        /// What was wrong with the response.
        message: String,
    },

    /// The configured OAuth base URL is unusable.
    #[error("invalid OAuth URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl AuthError {
    /// Creates a code-source error.
    pub fn code_source(message: impl Into<String>) -> Self {
        Self::CodeSource {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
