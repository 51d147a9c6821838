//! Engine configuration.
//!
//! Everything a run needs is passed explicitly through [`EngineConfig`];
//! the library reads no environment variables and no files. The binary
//! merges defaults, the config file, environment and flags into one value.

use std::time::Duration;

use thiserror::Error;

use crate::auth::ClientCredentials;
use crate::download::DEFAULT_MAX_RETRIES;
use crate::engine::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::provider::{DEFAULT_API_BASE, DEFAULT_PAGE_SIZE};
use crate::throttle::{DEFAULT_MAX_THROTTLE_WAIT, ThrottleError, ThrottleLimits, WindowKind};

/// Largest page size the provider accepts.
pub const MAX_PAGE_SIZE: u32 = 150;

/// Largest accepted per-asset attempt count.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Errors from configuration validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Worker count outside the supported range.
    #[error(
        "invalid concurrency {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// Rejected value.
        value: usize,
    },

    /// Page size outside the provider's range.
    #[error("invalid page size {value}: must be between 1 and {MAX_PAGE_SIZE}")]
    InvalidPageSize {
        /// Rejected value.
        value: u32,
    },

    /// Attempt count outside the supported range.
    #[error("invalid max retries {value}: must be between 1 and {MAX_RETRIES_LIMIT}")]
    InvalidMaxRetries {
        /// Rejected value.
        value: u32,
    },

    /// Throttle limits leave no capacity.
    #[error(transparent)]
    Throttle(#[from] ThrottleError),

    /// The API base is not an absolute http(s) URL.
    #[error("invalid API base URL: {url}")]
    InvalidApiBase {
        /// Rejected value.
        url: String,
    },
}

/// Settings for one harvest run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// OAuth2 application credentials, needed only for the code exchange.
    pub credentials: Option<ClientCredentials>,
    /// Provider API base.
    pub api_base: String,
    /// Request ceilings and safety buffer.
    pub limits: ThrottleLimits,
    /// Upper bound on the cumulative wait for one throttle admission.
    pub max_throttle_wait: Duration,
    /// Results per page requested from the provider.
    pub page_size: u32,
    /// Concurrent downloads per page.
    pub concurrency: usize,
    /// Attempts per asset, including the first.
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            api_base: DEFAULT_API_BASE.to_string(),
            limits: ThrottleLimits::default(),
            max_throttle_wait: DEFAULT_MAX_THROTTLE_WAIT,
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl EngineConfig {
    /// Checks every value against its supported range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConfigError::InvalidPageSize {
                value: self.page_size,
            });
        }
        if !(1..=MAX_RETRIES_LIMIT).contains(&self.max_retries) {
            return Err(ConfigError::InvalidMaxRetries {
                value: self.max_retries,
            });
        }

        for kind in WindowKind::ALL {
            let limit = match kind {
                WindowKind::Day => self.limits.daily,
                WindowKind::Hour => self.limits.hourly,
                WindowKind::Minute => self.limits.minute,
            };
            if self.limits.buffer >= limit {
                return Err(ThrottleError::InvalidLimits {
                    window: kind,
                    limit,
                    buffer: self.limits.buffer,
                }
                .into());
            }
        }

        match url::Url::parse(&self.api_base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(ConfigError::InvalidApiBase {
                url: self.api_base.clone(),
            }),
        }
    }
}
