//! Request admission against the provider's rolling rate limits.
//!
//! The provider bounds request counts per day, per hour and per minute. The
//! [`ThrottleGovernor`] tracks one [`ThrottleWindow`] per kind and answers
//! every admission check with an explicit [`Admission`] *before* the request
//! is sent. A configurable buffer keeps the count below the provider ceiling
//! to tolerate clock skew and bursts on the provider side.
//!
//! # Example
//!
//! ```
//! use soundgrab_core::throttle::{Admission, RequestClass, ThrottleGovernor, ThrottleLimits};
//!
//! let limits = ThrottleLimits { daily: 2000, hourly: 2000, minute: 60, buffer: 5 };
//! let governor = ThrottleGovernor::new(limits).unwrap();
//! assert_eq!(governor.admit(RequestClass::Search), Admission::Admitted);
//! ```

mod window;

pub use window::{ThrottleWindow, WindowKind};

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Default daily request ceiling (Freesound standard tier).
pub const DEFAULT_DAILY_LIMIT: u32 = 2000;

/// Default hourly request ceiling.
pub const DEFAULT_HOURLY_LIMIT: u32 = 2000;

/// Default per-minute request ceiling.
pub const DEFAULT_MINUTE_LIMIT: u32 = 60;

/// Default headroom kept below every ceiling.
pub const DEFAULT_RATE_BUFFER: u32 = 5;

/// Default bound on the cumulative time one request may wait for admission.
pub const DEFAULT_MAX_THROTTLE_WAIT: Duration = Duration::from_secs(60 * 60);

/// Configured ceilings for the three windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleLimits {
    /// Requests per day.
    pub daily: u32,
    /// Requests per hour.
    pub hourly: u32,
    /// Requests per minute.
    pub minute: u32,
    /// Headroom subtracted from every ceiling.
    pub buffer: u32,
}

impl Default for ThrottleLimits {
    fn default() -> Self {
        Self {
            daily: DEFAULT_DAILY_LIMIT,
            hourly: DEFAULT_HOURLY_LIMIT,
            minute: DEFAULT_MINUTE_LIMIT,
            buffer: DEFAULT_RATE_BUFFER,
        }
    }
}

impl ThrottleLimits {
    fn limit_for(&self, kind: WindowKind) -> u32 {
        match kind {
            WindowKind::Day => self.daily,
            WindowKind::Hour => self.hourly,
            WindowKind::Minute => self.minute,
        }
    }
}

/// Kind of upstream request asking for admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// A search page request.
    Search,
    /// An asset retrieval request.
    Download,
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search => f.write_str("search"),
            Self::Download => f.write_str("download"),
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Capacity was reserved; the request may be sent.
    Admitted,
    /// A window is full; nothing was reserved.
    Denied {
        /// The window that is full.
        window: WindowKind,
        /// Time until that window resets.
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns whether the request was admitted.
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Errors raised by the governor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    /// A window's buffer leaves no capacity at all.
    #[error("invalid {window} limit {limit}: buffer {buffer} leaves no request capacity")]
    InvalidLimits {
        /// Offending window.
        window: WindowKind,
        /// Configured limit.
        limit: u32,
        /// Configured buffer.
        buffer: u32,
    },

    /// Waiting for admission would exceed the configured bound.
    #[error(
        "{window} request limit reached; next slot in {}s exceeds the {}s wait bound",
        .retry_after.as_secs(),
        .max_wait.as_secs()
    )]
    Exhausted {
        /// The window that is full.
        window: WindowKind,
        /// Time until that window resets.
        retry_after: Duration,
        /// Configured wait bound.
        max_wait: Duration,
    },
}

/// Shared admission gate for every upstream request of a run.
///
/// All counters live behind one mutex, so concurrent workers sharing an
/// `Arc<ThrottleGovernor>` cannot collectively exceed a ceiling. The lock is
/// never held across an await point.
#[derive(Debug)]
pub struct ThrottleGovernor {
    windows: Mutex<Vec<ThrottleWindow>>,
    max_wait: Duration,
    disabled: bool,
}

impl ThrottleGovernor {
    /// Creates a governor with the given limits and the default wait bound.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::InvalidLimits`] if a buffer is not strictly
    /// below its window's limit.
    #[instrument(level = "debug")]
    pub fn new(limits: ThrottleLimits) -> Result<Self, ThrottleError> {
        let now = Instant::now();
        let mut windows = Vec::with_capacity(WindowKind::ALL.len());
        for kind in WindowKind::ALL {
            let limit = limits.limit_for(kind);
            if limits.buffer >= limit {
                return Err(ThrottleError::InvalidLimits {
                    window: kind,
                    limit,
                    buffer: limits.buffer,
                });
            }
            windows.push(ThrottleWindow::new(kind, limit, limits.buffer, now));
        }

        debug!("creating throttle governor");
        Ok(Self {
            windows: Mutex::new(windows),
            max_wait: DEFAULT_MAX_THROTTLE_WAIT,
            disabled: false,
        })
    }

    /// Creates a governor that admits every request.
    #[must_use]
    pub fn disabled() -> Self {
        debug!("creating disabled throttle governor");
        Self {
            windows: Mutex::new(Vec::new()),
            max_wait: Duration::ZERO,
            disabled: true,
        }
    }

    /// Sets the bound on the cumulative wait inside [`Self::acquire`].
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Returns whether throttling is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the cumulative wait bound.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Returns a snapshot of the window state.
    #[must_use]
    pub fn windows(&self) -> Vec<ThrottleWindow> {
        self.lock().clone()
    }

    /// Checks every window and reserves one request slot if all have room.
    ///
    /// Windows whose boundary has passed are reset first. On denial nothing
    /// is reserved; `retry_after` is the longest remaining time among the
    /// full windows.
    #[instrument(level = "trace", skip(self))]
    pub fn admit(&self, class: RequestClass) -> Admission {
        if self.disabled {
            return Admission::Admitted;
        }

        let now = Instant::now();
        let mut windows = self.lock();

        for window in windows.iter_mut() {
            if window.roll(now) {
                debug!(window = %window.kind(), "throttle window reset");
            }
        }

        let denial = windows
            .iter()
            .filter(|window| !window.has_capacity())
            .map(|window| (window.kind(), window.remaining(now)))
            .max_by_key(|(_, remaining)| *remaining);

        if let Some((window, retry_after)) = denial {
            debug!(
                %class,
                %window,
                retry_after_ms = retry_after.as_millis(),
                "request denied by throttle"
            );
            return Admission::Denied {
                window,
                retry_after,
            };
        }

        for window in windows.iter_mut() {
            window.record();
        }
        Admission::Admitted
    }

    /// Waits until a request slot is admitted.
    ///
    /// Sleeps through denials until the cumulative wait would exceed the
    /// configured bound.
    ///
    /// # Errors
    ///
    /// Returns [`ThrottleError::Exhausted`] when the next slot lies beyond
    /// the remaining wait budget.
    #[instrument(level = "debug", skip(self))]
    pub async fn acquire(&self, class: RequestClass) -> Result<(), ThrottleError> {
        let mut waited = Duration::ZERO;

        loop {
            match self.admit(class) {
                Admission::Admitted => return Ok(()),
                Admission::Denied {
                    window,
                    retry_after,
                } => {
                    if waited.saturating_add(retry_after) > self.max_wait {
                        warn!(
                            %class,
                            %window,
                            retry_after_secs = retry_after.as_secs(),
                            "throttle wait budget exhausted"
                        );
                        return Err(ThrottleError::Exhausted {
                            window,
                            retry_after,
                            max_wait: self.max_wait,
                        });
                    }

                    // A zero wait means the boundary is now; re-check right away.
                    let pause = retry_after.max(Duration::from_millis(1));
                    debug!(
                        %class,
                        %window,
                        wait_ms = pause.as_millis(),
                        "waiting for throttle window"
                    );
                    tokio::time::sleep(pause).await;
                    waited = waited.saturating_add(pause);
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ThrottleWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
