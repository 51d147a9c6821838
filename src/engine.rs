//! Harvest engine: search, paginate, fetch every asset once.
//!
//! The [`Harvester`] composes the pieces explicitly:
//!
//! ```text
//! Query -> ResultPaginator -> (per page) DownloadManager::fetch x N -> BatchReport
//! ```
//!
//! # Concurrency Model
//!
//! - One coordinating task advances the paginator, one page at a time
//! - Each asset of a page runs in its own Tokio task on a `JoinSet`
//! - A semaphore bounds the tasks that are actively fetching
//! - Outcomes are drained and reported on the coordinating task, so
//!   positions are strictly increasing
//! - Every upstream request goes through the shared `ThrottleGovernor`
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use soundgrab_core::auth::AuthToken;
//! use soundgrab_core::config::EngineConfig;
//! use soundgrab_core::engine::Harvester;
//! use soundgrab_core::progress::TracingReporter;
//! use soundgrab_core::query::{FilterFacets, Query, compile_filter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let harvester = Harvester::from_config(&EngineConfig::default(), AuthToken::bearer("token"))?;
//! let facets = FilterFacets::new().with_file_types(["wav"]);
//! let query = Query::new(Some("rain".to_string()), compile_filter(&facets)?);
//!
//! let report = harvester
//!     .run(query, Path::new("./sounds"), &mut TracingReporter)
//!     .await?;
//! println!("written: {}, failed: {}", report.written(), report.failed());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, instrument, warn};

use crate::auth::AuthToken;
use crate::config::{ConfigError, EngineConfig};
use crate::download::{
    DownloadError, DownloadManager, DownloadOutcome, DownloadStatus, FailureType, RetryDecision,
    RetryPolicy, asset_filename, classify_error, ensure_target_dir, retry_after_hint,
};
use crate::progress::ProgressReporter;
use crate::provider::{
    AssetDescriptor, AssetRetriever, DEFAULT_PAGE_SIZE, FreesoundClient, ProviderError,
    SearchBackend,
};
use crate::query::Query;
use crate::search::{ResultPage, ResultPaginator, SearchError};
use crate::throttle::ThrottleGovernor;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 32;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Fatal errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The provider client could not be set up.
    #[error("provider setup failed: {0}")]
    Setup(#[from] ProviderError),

    /// Searching failed beyond recovery.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// A download hit a condition that stops the run.
    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl RunError {
    /// Returns whether the provider rejected the token.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            Self::Search(e) => e.is_auth_rejection(),
            Self::Download(e) => e.is_auth_rejection(),
            _ => false,
        }
    }
}

/// Why a run stopped before the result set was exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The cancel handle was set.
    Cancelled,
    /// A throttle window stayed full beyond the wait bound.
    ThrottleExhausted {
        /// The throttle error, human readable.
        reason: String,
    },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::ThrottleExhausted { reason } => write!(f, "throttled: {reason}"),
        }
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Total results the provider reported for the query.
    pub total_count: u64,
    /// Result pages requested.
    pub pages_fetched: u32,
    /// Every outcome, in report order.
    pub outcomes: Vec<DownloadOutcome>,
    /// The confirmation gate refused the run.
    pub declined: bool,
    /// Set when the run stopped early.
    pub halted: Option<HaltReason>,
}

impl BatchReport {
    fn count(&self, pred: impl Fn(&DownloadStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    /// Assets written on the first attempt.
    #[must_use]
    pub fn written(&self) -> usize {
        self.count(|s| matches!(s, DownloadStatus::Written))
    }

    /// Assets skipped because their file already existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, DownloadStatus::SkippedExisting))
    }

    /// Assets written after at least one retry.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.count(|s| matches!(s, DownloadStatus::Retried { .. }))
    }

    /// Assets that were not written.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, DownloadStatus::Failed { .. }))
    }

    /// Returns whether the run went through the whole result set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.declined && self.halted.is_none()
    }
}

enum PageStep {
    Page(ResultPage),
    End,
    Halted(HaltReason),
}

/// Per-asset task result; `None` means the task stood down before fetching.
type TaskResult = Option<Result<DownloadOutcome, DownloadError>>;

/// Runs a query end to end against a search backend and a download manager.
pub struct Harvester {
    search: Arc<dyn SearchBackend>,
    manager: DownloadManager,
    concurrency: usize,
    page_size: u32,
    cancel: Arc<AtomicBool>,
}

impl fmt::Debug for Harvester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harvester")
            .field("manager", &self.manager)
            .field("concurrency", &self.concurrency)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl Harvester {
    /// Creates a harvester; the paginator shares the manager's governor.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidConcurrency`] if the value is outside
    /// 1..=32.
    #[instrument(level = "debug", skip(search, manager))]
    pub fn new(
        search: Arc<dyn SearchBackend>,
        manager: DownloadManager,
        concurrency: usize,
    ) -> Result<Self, RunError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(RunError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_retries = manager.retry_policy().max_attempts(),
            throttle_disabled = manager.governor().is_disabled(),
            "creating harvester"
        );

        Ok(Self {
            search,
            manager,
            concurrency,
            page_size: DEFAULT_PAGE_SIZE,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Builds the Freesound client, governor and manager from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] for invalid settings and
    /// [`RunError::Setup`] if the HTTP client cannot be built.
    pub fn from_config(config: &EngineConfig, token: AuthToken) -> Result<Self, RunError> {
        config.validate()?;

        let client = Arc::new(FreesoundClient::with_base_url(
            &config.api_base,
            token,
            config.page_size,
        )?);
        let governor = ThrottleGovernor::new(config.limits)
            .map_err(ConfigError::from)?
            .with_max_wait(config.max_throttle_wait);
        let retriever: Arc<dyn AssetRetriever> = client.clone();
        let manager = DownloadManager::new(
            retriever,
            Arc::new(governor),
            RetryPolicy::with_max_attempts(config.max_retries),
        );

        Ok(Self::new(client, manager, config.concurrency)?.with_page_size(config.page_size))
    }

    /// Sets the provider page size used to compute the page count.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Flag that stops the run between assets and between pages when set.
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Runs `query` and acquires every result into `target_dir`.
    ///
    /// Per-asset failures end up in the report; throttle exhaustion and
    /// cancellation stop the run early with [`BatchReport::halted`] set.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Download`] for an unusable target directory
    /// (checked before any request) or a rejected token, and
    /// [`RunError::Search`] when a page cannot be fetched.
    #[instrument(skip(self, query, reporter), fields(target_dir = %target_dir.display()))]
    pub async fn run(
        &self,
        query: Query,
        target_dir: &Path,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<BatchReport, RunError> {
        ensure_target_dir(target_dir).await?;

        let mut report = BatchReport::default();
        let mut paginator = ResultPaginator::open(
            Arc::clone(&self.search),
            Arc::clone(self.manager.governor()),
            query,
            self.page_size,
        );

        info!("starting harvest");

        let first = match self.advance(&mut paginator).await? {
            PageStep::Page(page) => page,
            PageStep::End => return Ok(self.finish(report, &paginator, reporter)),
            PageStep::Halted(reason) => {
                report.halted = Some(reason);
                return Ok(self.finish(report, &paginator, reporter));
            }
        };

        report.total_count = first.total_count;
        if first.items.is_empty() && !first.has_next {
            info!("query matched no results");
            return Ok(self.finish(report, &paginator, reporter));
        }

        if !reporter.confirm(report.total_count) {
            info!(total = report.total_count, "run declined");
            report.declined = true;
            return Ok(self.finish(report, &paginator, reporter));
        }

        let page_count = paginator.page_count().unwrap_or(1);
        let mut page = first;
        let mut page_number: u64 = 1;
        let mut position: u64 = 0;

        loop {
            if self.is_cancelled() {
                report.halted = Some(HaltReason::Cancelled);
                break;
            }

            reporter.page(page_number, page_count);
            let has_next = page.has_next;
            if let Some(reason) = self
                .fetch_page(page.items, target_dir, reporter, &mut report, &mut position)
                .await?
            {
                report.halted = Some(reason);
                break;
            }

            if !has_next {
                break;
            }
            if self.is_cancelled() {
                report.halted = Some(HaltReason::Cancelled);
                break;
            }

            match self.advance(&mut paginator).await? {
                PageStep::Page(next) => {
                    page = next;
                    page_number += 1;
                }
                PageStep::End => break,
                PageStep::Halted(reason) => {
                    report.halted = Some(reason);
                    break;
                }
            }
        }

        Ok(self.finish(report, &paginator, reporter))
    }

    fn finish(
        &self,
        mut report: BatchReport,
        paginator: &ResultPaginator,
        reporter: &mut dyn ProgressReporter,
    ) -> BatchReport {
        report.pages_fetched = paginator.pages_fetched();
        info!(
            total = report.total_count,
            pages = report.pages_fetched,
            written = report.written(),
            skipped = report.skipped(),
            retried = report.retried(),
            failed = report.failed(),
            declined = report.declined,
            halted = ?report.halted,
            concurrency = self.concurrency,
            "harvest complete"
        );
        reporter.finish(&report);
        report
    }

    /// Advances the paginator, retrying transient search failures.
    async fn advance(&self, paginator: &mut ResultPaginator) -> Result<PageStep, RunError> {
        let policy = self.manager.retry_policy();
        let mut attempt: u32 = 1;

        loop {
            match paginator.advance().await {
                Ok(Some(page)) => return Ok(PageStep::Page(page)),
                Ok(None) => return Ok(PageStep::End),
                Err(SearchError::Throttled(e)) => {
                    warn!(error = %e, "search not admitted");
                    return Ok(PageStep::Halted(HaltReason::ThrottleExhausted {
                        reason: e.to_string(),
                    }));
                }
                Err(SearchError::Provider(error)) => {
                    let failure_type = classify_error(&error);
                    match policy.should_retry(failure_type, attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next,
                        } => {
                            let delay = if failure_type == FailureType::RateLimited {
                                retry_after_hint(&error).map_or(delay, |hint| hint.max(delay))
                            } else {
                                delay
                            };
                            warn!(
                                %error,
                                next_attempt = next,
                                delay_ms = delay.as_millis(),
                                "search failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            warn!(%error, %reason, "search failed");
                            return Err(SearchError::Provider(error).into());
                        }
                    }
                }
            }

            if self.is_cancelled() {
                return Ok(PageStep::Halted(HaltReason::Cancelled));
            }
        }
    }

    /// Fetches one page's assets concurrently and reports each outcome.
    ///
    /// Returns the halt reason if the run must stop after this page.
    async fn fetch_page(
        &self,
        items: Vec<AssetDescriptor>,
        target_dir: &Path,
        reporter: &mut dyn ProgressReporter,
        report: &mut BatchReport,
        position: &mut u64,
    ) -> Result<Option<HaltReason>, RunError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let stop = Arc::new(AtomicBool::new(false));
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();
        let mut spawned: HashMap<Id, (u64, String)> = HashMap::new();

        for asset in items {
            let semaphore = Arc::clone(&semaphore);
            let stop = Arc::clone(&stop);
            let cancel = Arc::clone(&self.cancel);
            let manager = self.manager.clone();
            let target_dir = target_dir.to_path_buf();
            let identity = (asset.id, asset_filename(&asset));

            let handle = tasks.spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = semaphore.acquire_owned().await.ok()?;
                if stop.load(Ordering::SeqCst) || cancel.load(Ordering::SeqCst) {
                    debug!(asset_id = asset.id, "standing down before fetch");
                    return None;
                }
                let result = manager.fetch(&asset, &target_dir).await;
                // Raise the flag while the permit is still held so queued
                // tasks see it before they start.
                if matches!(&result, Ok(outcome) if outcome.throttle_exhausted) {
                    stop.store(true, Ordering::SeqCst);
                }
                Some(result)
            });
            spawned.insert(handle.id(), identity);
        }

        let mut halt = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(Ok(outcome))) => {
                    *position += 1;
                    reporter.report(&outcome, *position, report.total_count);
                    if outcome.throttle_exhausted
                        && halt.is_none()
                        && let DownloadStatus::Failed { reason, .. } = &outcome.status
                    {
                        halt = Some(HaltReason::ThrottleExhausted {
                            reason: reason.clone(),
                        });
                    }
                    report.outcomes.push(outcome);
                }
                Ok(Some(Err(error))) => {
                    warn!(%error, "fatal download error, aborting run");
                    tasks.abort_all();
                    return Err(error.into());
                }
                Ok(None) => {}
                Err(join_error) => {
                    let Some((asset_id, filename)) = spawned.remove(&join_error.id()) else {
                        warn!(error = %join_error, "unknown download task failed to complete");
                        continue;
                    };
                    warn!(asset_id, error = %join_error, "download task failed to complete");
                    let outcome = DownloadOutcome {
                        asset_id,
                        target_path: target_dir.join(filename),
                        status: DownloadStatus::Failed {
                            attempts: 0,
                            reason: format!("download task failed: {join_error}"),
                        },
                        throttle_exhausted: false,
                    };
                    *position += 1;
                    reporter.report(&outcome, *position, report.total_count);
                    report.outcomes.push(outcome);
                }
            }
        }

        if halt.is_none() && self.is_cancelled() {
            halt = Some(HaltReason::Cancelled);
        }
        Ok(halt)
    }
}
