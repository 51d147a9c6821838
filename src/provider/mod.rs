//! Search and retrieval primitives.
//!
//! The engine talks to the provider only through two object-safe traits:
//! - [`SearchBackend`] - paged search (`search` + `next_page`)
//! - [`AssetRetriever`] - writes one asset's bytes to a given path
//!
//! [`FreesoundClient`] implements both over the Freesound APIv2.
//!
//! # Example
//!
//! ```no_run
//! use soundgrab_core::auth::AuthToken;
//! use soundgrab_core::provider::{FreesoundClient, SearchBackend};
//! use soundgrab_core::query::Query;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FreesoundClient::new(AuthToken::bearer("token"), 15)?;
//! let page = client.search(&Query::new(Some("rain".to_string()), None)).await?;
//! println!("{} results", page.count);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::FreesoundClient;
pub use error::ProviderError;
pub use models::{AssetDescriptor, PageCursor, SearchPage};

use std::path::Path;

use async_trait::async_trait;

use crate::query::Query;

/// Production API base.
pub const DEFAULT_API_BASE: &str = "https://freesound.org/apiv2/";

/// Results per page in the reference deployment.
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// HTTP request timeout (5 minutes for large audio files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Paged search primitive.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Requests the first page of results for `query`.
    async fn search(&self, query: &Query) -> Result<SearchPage, ProviderError>;

    /// Requests the page behind a continuation handle.
    async fn next_page(&self, cursor: &PageCursor) -> Result<SearchPage, ProviderError>;
}

/// Per-asset retrieval primitive.
#[async_trait]
pub trait AssetRetriever: Send + Sync {
    /// Writes the bytes of asset `asset_id` to `destination`, returning the
    /// number of bytes written. The file is created or truncated.
    async fn retrieve(&self, asset_id: u64, destination: &Path) -> Result<u64, ProviderError>;
}
