//! Soundgrab Core Library
//!
//! Rate-governed bulk retrieval of Freesound search results: a query is
//! compiled into a provider filter, its result set is paged through lazily,
//! and every asset is downloaded exactly once into a flat directory while
//! staying under the provider's request ceilings.
//!
//! # Architecture
//!
//! - [`query`] - Query model and facet-to-filter compilation
//! - [`throttle`] - Day/hour/minute admission windows
//! - [`provider`] - Search and retrieval primitives, Freesound HTTP client
//! - [`auth`] - Access tokens and the OAuth2 code exchange
//! - [`search`] - Lazy paginator over a result set
//! - [`download`] - Filename cleaning, retry policy, idempotent fetch
//! - [`progress`] - Confirmation gate and progress callbacks
//! - [`engine`] - The [`Harvester`] composing all of the above
//! - [`config`] - Explicit engine configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod download;
pub mod engine;
pub mod progress;
pub mod provider;
pub mod query;
pub mod search;
pub mod throttle;

mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use auth::{AuthCodeSource, AuthError, AuthToken, ClientCredentials, OAuthClient};
pub use config::{ConfigError, EngineConfig};
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, DownloadManager, DownloadOutcome, DownloadStatus,
    RetryPolicy,
};
pub use engine::{BatchReport, DEFAULT_CONCURRENCY, HaltReason, Harvester, RunError};
pub use progress::{ProgressReporter, TracingReporter};
pub use provider::{AssetDescriptor, AssetRetriever, FreesoundClient, SearchBackend};
pub use query::{FilterFacets, Query, SortOrder, compile_filter};
pub use throttle::{ThrottleGovernor, ThrottleLimits};
