//! A single rolling request-count window.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Length of the rolling windows tracked by the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// 24 hours.
    Day,
    /// 60 minutes.
    Hour,
    /// 60 seconds.
    Minute,
}

impl WindowKind {
    /// Every window kind, longest first.
    pub const ALL: [Self; 3] = [Self::Day, Self::Hour, Self::Minute];

    /// Wall-clock length of the window.
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::Day => Duration::from_secs(24 * 60 * 60),
            Self::Hour => Duration::from_secs(60 * 60),
            Self::Minute => Duration::from_secs(60),
        }
    }

    /// Lower-case label used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "daily",
            Self::Hour => "hourly",
            Self::Minute => "minute",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request count for one window kind.
///
/// `count` never exceeds `limit - buffer`: the governor checks
/// [`ThrottleWindow::has_capacity`] on every window before recording.
#[derive(Debug, Clone)]
pub struct ThrottleWindow {
    kind: WindowKind,
    limit: u32,
    buffer: u32,
    count: u32,
    window_start: Instant,
}

impl ThrottleWindow {
    pub(crate) fn new(kind: WindowKind, limit: u32, buffer: u32, now: Instant) -> Self {
        Self {
            kind,
            limit,
            buffer,
            count: 0,
            window_start: now,
        }
    }

    /// Window kind.
    #[must_use]
    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    /// Provider-imposed ceiling.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Headroom kept below the ceiling.
    #[must_use]
    pub fn buffer(&self) -> u32 {
        self.buffer
    }

    /// Requests admitted in the current window.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Start of the current window.
    #[must_use]
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Highest count the window may reach.
    #[must_use]
    pub fn ceiling(&self) -> u32 {
        self.limit.saturating_sub(self.buffer)
    }

    /// Resets the window if `now` has crossed its boundary.
    ///
    /// Returns `true` when a reset happened.
    pub(crate) fn roll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) >= self.kind.duration() {
            self.count = 0;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    pub(crate) fn has_capacity(&self) -> bool {
        self.count.saturating_add(1) <= self.ceiling()
    }

    pub(crate) fn record(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Time left until the window resets.
    pub(crate) fn remaining(&self, now: Instant) -> Duration {
        (self.window_start + self.kind.duration()).saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_subtracts_buffer() {
        let window = ThrottleWindow::new(WindowKind::Minute, 60, 5, Instant::now());
        assert_eq!(window.ceiling(), 55);
    }

    #[test]
    fn test_ceiling_saturates_at_zero() {
        let window = ThrottleWindow::new(WindowKind::Minute, 3, 5, Instant::now());
        assert_eq!(window.ceiling(), 0);
        assert!(!window.has_capacity());
    }

    #[tokio::test(start_paused = true)]
    async fn test_roll_resets_only_after_boundary() {
        let mut window = ThrottleWindow::new(WindowKind::Minute, 10, 0, Instant::now());
        window.record();
        window.record();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!window.roll(Instant::now()));
        assert_eq!(window.count(), 2);
        assert_eq!(window.remaining(Instant::now()), Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(window.roll(Instant::now()));
        assert_eq!(window.count(), 0);
        assert_eq!(window.window_start(), Instant::now());
    }
}
