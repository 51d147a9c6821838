//! Progress observation for a harvest run.
//!
//! The engine never prompts or prints by itself. Everything user-facing goes
//! through a [`ProgressReporter`]: the confirmation gate before the first
//! download and the per-page and per-asset notifications afterwards.

use tracing::{info, warn};

use crate::download::{DownloadOutcome, DownloadStatus};
use crate::engine::BatchReport;

/// Observer of a harvest run.
///
/// Implementations must not influence retry or control flow; apart from
/// [`confirm`](Self::confirm) they are purely observational. Calls happen
/// on the coordinating task, one at a time.
pub trait ProgressReporter: Send {
    /// Asked once, after the first page reveals the total result count and
    /// before any download. Returning `false` ends the run without fetching.
    ///
    /// May block (for example, on a terminal prompt).
    fn confirm(&mut self, total_count: u64) -> bool;

    /// A result page is about to be processed (`page_number` is 1-based).
    fn page(&mut self, page_number: u64, page_count: u64) {
        let _ = (page_number, page_count);
    }

    /// One asset finished; `position` is 1-based and strictly increasing.
    fn report(&mut self, outcome: &DownloadOutcome, position: u64, total: u64);

    /// The run ended, successfully or not.
    fn finish(&mut self, report: &BatchReport) {
        let _ = report;
    }
}

/// Headless reporter that logs through `tracing` and confirms every run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn confirm(&mut self, total_count: u64) -> bool {
        info!(total_count, "starting harvest");
        true
    }

    fn page(&mut self, page_number: u64, page_count: u64) {
        info!(page_number, page_count, "processing result page");
    }

    fn report(&mut self, outcome: &DownloadOutcome, position: u64, total: u64) {
        match &outcome.status {
            DownloadStatus::Failed { attempts, reason } => warn!(
                position,
                total,
                asset_id = outcome.asset_id,
                attempts,
                %reason,
                "asset failed"
            ),
            status => info!(
                position,
                total,
                asset_id = outcome.asset_id,
                path = %outcome.target_path.display(),
                ?status,
                "asset done"
            ),
        }
    }

    fn finish(&mut self, report: &BatchReport) {
        info!(
            written = report.written(),
            skipped = report.skipped(),
            retried = report.retried(),
            failed = report.failed(),
            pages = report.pages_fetched,
            "harvest finished"
        );
    }
}
