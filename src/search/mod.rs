//! Paginated traversal of a search result set.
//!
//! [`ResultPaginator`] turns the provider's page-plus-continuation protocol
//! into a lazy, finite sequence of [`ResultPage`]s. Every page request passes
//! through the shared [`ThrottleGovernor`](crate::throttle::ThrottleGovernor)
//! first.

mod paginator;

pub use paginator::{ResultPage, ResultPaginator};

use thiserror::Error;

use crate::provider::ProviderError;
use crate::throttle::ThrottleError;

/// Errors raised while paging through search results.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The search primitive failed.
    #[error("search request failed: {0}")]
    Provider(#[from] ProviderError),

    /// No throttle slot became available within the wait bound.
    #[error("search throttled: {0}")]
    Throttled(#[from] ThrottleError),
}

impl SearchError {
    /// Returns whether the provider rejected the token.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_auth_rejection())
    }
}
