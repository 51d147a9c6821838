//! Idempotent per-asset acquisition.
//!
//! [`DownloadManager::fetch`] turns one [`AssetDescriptor`] into one file in
//! the target directory, or into a reported failure. It never overwrites an
//! existing file: presence of the final name means the asset was already
//! acquired and the call returns without touching the network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::filename::{asset_filename, partial_path};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error, retry_after_hint};
use super::DownloadError;
use crate::provider::{AssetDescriptor, AssetRetriever};
use crate::throttle::{RequestClass, ThrottleGovernor};

/// How one asset ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Retrieved and written on the first attempt.
    Written,
    /// The target file already existed; nothing was requested.
    SkippedExisting,
    /// Written after at least one retry.
    Retried {
        /// Total attempts, including the successful one.
        attempts: u32,
    },
    /// Not written.
    Failed {
        /// Retrieval attempts made (0 when no request was admitted).
        attempts: u32,
        /// Last error, human readable.
        reason: String,
    },
}

impl DownloadStatus {
    /// Returns whether the asset's file is present after the call.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Result of one [`DownloadManager::fetch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Provider id of the asset.
    pub asset_id: u64,
    /// Final path of the asset's file.
    pub target_path: PathBuf,
    /// What happened.
    pub status: DownloadStatus,
    /// Set when the failure was a throttle wait beyond the configured bound;
    /// the run cannot make progress and should stop.
    pub throttle_exhausted: bool,
}

impl DownloadOutcome {
    fn new(asset_id: u64, target_path: PathBuf, status: DownloadStatus) -> Self {
        Self {
            asset_id,
            target_path,
            status,
            throttle_exhausted: false,
        }
    }
}

/// Fetches assets into a directory with throttle admission and retries.
#[derive(Clone)]
pub struct DownloadManager {
    retriever: Arc<dyn AssetRetriever>,
    governor: Arc<ThrottleGovernor>,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("governor", &self.governor)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl DownloadManager {
    /// Creates a manager over the given retrieval primitive.
    #[must_use]
    pub fn new(
        retriever: Arc<dyn AssetRetriever>,
        governor: Arc<ThrottleGovernor>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            retriever,
            governor,
            retry_policy,
        }
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns the shared throttle governor.
    #[must_use]
    pub fn governor(&self) -> &Arc<ThrottleGovernor> {
        &self.governor
    }

    /// Acquires `asset` into `target_dir`.
    ///
    /// Per-asset problems (exhausted retries, permanent HTTP errors, throttle
    /// exhaustion) come back as [`DownloadStatus::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::MissingTargetDir`],
    /// [`DownloadError::NotADirectory`] or [`DownloadError::TargetDirAccess`]
    /// for an unusable directory, and [`DownloadError::AuthRejected`] when the
    /// provider refuses the token.
    #[instrument(skip(self, asset), fields(asset_id = asset.id))]
    pub async fn fetch(
        &self,
        asset: &AssetDescriptor,
        target_dir: &Path,
    ) -> Result<DownloadOutcome, DownloadError> {
        check_target_dir(target_dir).await?;

        let filename = asset_filename(asset);
        let target_path = target_dir.join(&filename);
        if path_exists(&target_path).await {
            debug!(path = %target_path.display(), "target exists, skipping");
            return Ok(DownloadOutcome::new(
                asset.id,
                target_path,
                DownloadStatus::SkippedExisting,
            ));
        }

        let part_path = partial_path(target_dir, &filename);
        let mut attempt: u32 = 1;

        loop {
            if let Err(throttle) = self.governor.acquire(RequestClass::Download).await {
                warn!(error = %throttle, "download not admitted");
                let mut outcome = DownloadOutcome::new(
                    asset.id,
                    target_path,
                    DownloadStatus::Failed {
                        attempts: attempt - 1,
                        reason: throttle.to_string(),
                    },
                );
                outcome.throttle_exhausted = true;
                return Ok(outcome);
            }

            match self.retriever.retrieve(asset.id, &part_path).await {
                Ok(bytes) => {
                    let status = if attempt == 1 {
                        DownloadStatus::Written
                    } else {
                        DownloadStatus::Retried { attempts: attempt }
                    };
                    return Ok(
                        finalize(asset.id, &part_path, target_path, status, bytes).await
                    );
                }
                Err(error) => {
                    remove_partial(&part_path).await;

                    let failure_type = classify_error(&error);
                    if failure_type == FailureType::NeedsAuth {
                        return Err(DownloadError::AuthRejected { source: error });
                    }

                    match self.retry_policy.should_retry(failure_type, attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next,
                        } => {
                            let delay = if failure_type == FailureType::RateLimited {
                                retry_after_hint(&error).map_or(delay, |hint| hint.max(delay))
                            } else {
                                delay
                            };
                            debug!(
                                %error,
                                next_attempt = next,
                                delay_ms = delay.as_millis(),
                                "retrieval failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            warn!(%error, attempts = attempt, %reason, "retrieval failed");
                            return Ok(DownloadOutcome::new(
                                asset.id,
                                target_path,
                                DownloadStatus::Failed {
                                    attempts: attempt,
                                    reason: format!("{error} ({reason})"),
                                },
                            ));
                        }
                    }
                }
            }
        }
    }
}

/// Moves a completed part file to its final name without clobbering a
/// file that appeared in the meantime.
async fn finalize(
    asset_id: u64,
    part_path: &Path,
    target_path: PathBuf,
    status: DownloadStatus,
    bytes: u64,
) -> DownloadOutcome {
    if path_exists(&target_path).await {
        debug!(path = %target_path.display(), "target appeared during retrieval");
        remove_partial(part_path).await;
        return DownloadOutcome::new(asset_id, target_path, DownloadStatus::SkippedExisting);
    }

    if let Err(error) = tokio::fs::rename(part_path, &target_path).await {
        warn!(%error, path = %target_path.display(), "could not move part file into place");
        remove_partial(part_path).await;
        let attempts = match status {
            DownloadStatus::Retried { attempts } => attempts,
            _ => 1,
        };
        return DownloadOutcome::new(
            asset_id,
            target_path,
            DownloadStatus::Failed {
                attempts,
                reason: format!("rename failed: {error}"),
            },
        );
    }

    info!(path = %target_path.display(), bytes, "asset written");
    DownloadOutcome::new(asset_id, target_path, status)
}

/// Name of the scratch file used to check that the target accepts writes.
const WRITE_CHECK_PREFIX: &str = ".soundgrab-write-check";

/// Checks that `target_dir` exists, is a directory and accepts new files.
///
/// Runs once per harvest before any request, so an unusable directory never
/// costs a throttle slot.
///
/// # Errors
///
/// Returns [`DownloadError::MissingTargetDir`],
/// [`DownloadError::NotADirectory`], [`DownloadError::TargetDirAccess`] or
/// [`DownloadError::TargetDirNotWritable`].
pub async fn ensure_target_dir(target_dir: &Path) -> Result<(), DownloadError> {
    check_target_dir(target_dir).await?;

    let probe = target_dir.join(format!("{WRITE_CHECK_PREFIX}-{}", std::process::id()));
    if let Err(source) = tokio::fs::write(&probe, b"").await {
        return Err(DownloadError::TargetDirNotWritable {
            path: target_dir.to_path_buf(),
            source,
        });
    }
    if let Err(error) = tokio::fs::remove_file(&probe).await {
        warn!(%error, path = %probe.display(), "could not remove write check file");
    }
    Ok(())
}

async fn check_target_dir(target_dir: &Path) -> Result<(), DownloadError> {
    match tokio::fs::metadata(target_dir).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(DownloadError::not_a_directory(target_dir)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Err(DownloadError::missing_target_dir(target_dir))
        }
        Err(source) => Err(DownloadError::TargetDirAccess {
            path: target_dir.to_path_buf(),
            source,
        }),
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn remove_partial(part_path: &Path) {
    match tokio::fs::remove_file(part_path).await {
        Ok(()) => debug!(path = %part_path.display(), "removed partial file"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => warn!(%error, path = %part_path.display(), "could not remove partial file"),
    }
}
