//! Interactive terminal front end: progress bar, confirmation prompt and
//! the OAuth2 code prompt.

use std::io::{self, BufRead, IsTerminal, Write};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use soundgrab_core::auth::{AuthCodeSource, AuthError};
use soundgrab_core::{BatchReport, DownloadOutcome, DownloadStatus, ProgressReporter};
use tracing::{debug, warn};
use url::Url;

/// Reports progress with an `indicatif` bar and asks for confirmation on
/// stdin unless `assume_yes` is set.
pub struct TerminalReporter {
    bar: ProgressBar,
    assume_yes: bool,
}

impl TerminalReporter {
    /// Creates a reporter; the bar is hidden when `show_bar` is false.
    #[must_use]
    pub fn new(assume_yes: bool, show_bar: bool) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        if show_bar {
            bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar, assume_yes }
    }
}

impl ProgressReporter for TerminalReporter {
    fn confirm(&mut self, total_count: u64) -> bool {
        if self.assume_yes {
            self.bar.set_length(total_count);
            return true;
        }

        let prompt = format!("Found {total_count} sounds. Download them all? [y/N] ");
        let confirmed = match prompt_line(&prompt) {
            Ok(answer) => is_yes(&answer),
            Err(error) => {
                warn!(%error, "could not read confirmation");
                false
            }
        };
        if confirmed {
            self.bar.set_length(total_count);
        }
        confirmed
    }

    fn page(&mut self, page_number: u64, page_count: u64) {
        self.bar.set_message(format!("page {page_number}/{page_count}"));
    }

    fn report(&mut self, outcome: &DownloadOutcome, position: u64, total: u64) {
        self.bar.set_position(position);
        match &outcome.status {
            DownloadStatus::Failed { reason, .. } => {
                self.bar.suspend(|| {
                    warn!(asset_id = outcome.asset_id, %reason, "download failed");
                });
            }
            status => debug!(
                position,
                total,
                asset_id = outcome.asset_id,
                ?status,
                "download done"
            ),
        }
    }

    fn finish(&mut self, report: &BatchReport) {
        self.bar.finish_and_clear();
        if report.declined {
            eprintln!("Nothing downloaded.");
            return;
        }
        eprintln!(
            "{} written, {} retried, {} already present, {} failed ({} results, {} pages)",
            report.written(),
            report.retried(),
            report.skipped(),
            report.failed(),
            report.total_count,
            report.pages_fetched
        );
        if let Some(reason) = &report.halted {
            eprintln!("Stopped early: {reason}. Run again to continue.");
        }
    }
}

/// Shows the authorize URL and reads the code the user pastes back.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinCodeSource;

impl AuthCodeSource for StdinCodeSource {
    fn obtain_auth_code(&self, authorize_url: &Url) -> Result<String, AuthError> {
        if !io::stdin().is_terminal() {
            return Err(AuthError::code_source(
                "stdin is not a terminal; pass --access-token instead",
            ));
        }
        eprintln!("Open this URL in a browser and authorize access:\n\n  {authorize_url}\n");
        prompt_line("Paste the authorization code: ")
            .map(|code| code.trim().to_string())
            .map_err(|e| AuthError::code_source(e.to_string()))
    }
}

fn prompt_line(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
