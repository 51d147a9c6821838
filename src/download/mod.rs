//! Idempotent, collision-safe asset acquisition.
//!
//! - [`filename`](clean_name): display name to filesystem-safe file name
//! - [`DownloadManager`]: skip-if-exists, throttle admission, retrieval into
//!   a `.part` file, retry on transient failure, rename into place
//! - [`RetryPolicy`] / [`classify_error`]: which failures are worth retrying
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use soundgrab_core::auth::AuthToken;
//! use soundgrab_core::download::{DownloadManager, RetryPolicy};
//! use soundgrab_core::provider::{AssetDescriptor, FreesoundClient};
//! use soundgrab_core::throttle::{ThrottleGovernor, ThrottleLimits};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(FreesoundClient::new(AuthToken::bearer("token"), 15)?);
//! let governor = Arc::new(ThrottleGovernor::new(ThrottleLimits::default())?);
//! let manager = DownloadManager::new(client, governor, RetryPolicy::default());
//!
//! let asset = AssetDescriptor::new(1234, "Rain - Heavy.wav", "wav");
//! let outcome = manager.fetch(&asset, Path::new("./sounds")).await?;
//! println!("{:?} -> {}", outcome.status, outcome.target_path.display());
//! # Ok(())
//! # }
//! ```

mod error;
mod filename;
mod manager;
mod retry;

pub use error::DownloadError;
pub use filename::{UNTITLED, asset_filename, clean_extension, clean_name, partial_path};
pub use manager::{DownloadManager, DownloadOutcome, DownloadStatus, ensure_target_dir};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after, retry_after_hint,
};

// Note: no module-local Result aliases; signatures spell out
// `Result<T, DownloadError>`.
