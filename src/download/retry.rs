//! Retry logic with exponential backoff for transient retrieval failures.
//!
//! When a retrieval fails, the [`ProviderError`] is classified into a
//! [`FailureType`]:
//! - [`FailureType::Transient`] - may succeed on retry (timeouts, 5xx, 408)
//! - [`FailureType::RateLimited`] - provider-side 429, honors `Retry-After`
//! - [`FailureType::Permanent`] - retrying cannot help (404, other 4xx, IO)
//! - [`FailureType::NeedsAuth`] - token rejected, fatal for the whole run
//!
//! The [`RetryPolicy`] then decides whether to retry based on failure type
//! and attempt count, with exponential backoff and jitter.
//!
//! # Example
//!
//! ```
//! use soundgrab_core::download::{RetryDecision, RetryPolicy, classify_error};
//! use soundgrab_core::provider::ProviderError;
//!
//! let policy = RetryPolicy::default();
//! let error = ProviderError::http_status("https://freesound.org/apiv2/sounds/1/download/", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => println!("retry #{attempt} in {delay:?}"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::provider::ProviderError;

/// Default maximum attempts per asset, including the first.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Upper bound applied to provider `Retry-After` values.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60 * 60);

/// Classification of retrieval failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,

    /// Failure that won't succeed regardless of retries.
    Permanent,

    /// The provider rejected the token.
    NeedsAuth,

    /// Provider rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt this will be (1-indexed, so the first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry behavior with exponential backoff.
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter
/// ```
///
/// With defaults, delays are approximately 1s and 2s before the third and
/// final attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings. `max_attempts` is at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with a custom `max_attempts` and default delays.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether to retry after `attempt` (1-indexed) failed.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "authentication rejected".to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + calculate_jitter()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn calculate_jitter() -> Duration {
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(0..=MAX_JITTER.as_millis() as u64))
}

/// Classifies a provider error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | 401, 403 (`AuthRejected`) | NeedsAuth |
/// | 408, 5xx | Transient |
/// | 429 | RateLimited |
/// | other 4xx | Permanent |
/// | Timeout, Network (non-TLS) | Transient |
/// | Network (TLS) | Permanent |
/// | IO, invalid URL, invalid response, client build | Permanent |
#[instrument(level = "debug")]
pub fn classify_error(error: &ProviderError) -> FailureType {
    match error {
        ProviderError::AuthRejected { .. } => FailureType::NeedsAuth,
        ProviderError::HttpStatus { status, .. } => classify_http_status(*status),
        ProviderError::Timeout { .. } => FailureType::Transient,
        ProviderError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        ProviderError::Io { .. }
        | ProviderError::InvalidUrl { .. }
        | ProviderError::InvalidResponse { .. }
        | ProviderError::ClientBuild { .. } => FailureType::Permanent,
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 => FailureType::NeedsAuth,
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        400..500 => FailureType::Permanent,
        500..600 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

/// Returns the provider's requested wait for a rate-limited response.
#[must_use]
pub fn retry_after_hint(error: &ProviderError) -> Option<Duration> {
    match error {
        ProviderError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

/// Parses a `Retry-After` header value (integer seconds or HTTP-date),
/// capped at one hour.
///
/// ```
/// use std::time::Duration;
/// use soundgrab_core::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument(level = "debug")]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        let duration = Duration::from_secs(seconds);
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };

    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) if duration > MAX_RETRY_AFTER => {
            warn!(
                delay_secs = duration.as_secs(),
                "Retry-After date exceeds maximum, capping at 1 hour"
            );
            Some(MAX_RETRY_AFTER)
        }
        Ok(duration) => Some(duration),
        Err(_) => Some(Duration::ZERO),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const URL: &str = "https://freesound.org/apiv2/sounds/1/download/";

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO, 2.0).max_attempts(), 1);
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        let first = policy.calculate_delay(1);
        assert!(first >= Duration::from_secs(1) && first <= Duration::from_millis(1500));
        let second = policy.calculate_delay(2);
        assert!(second >= Duration::from_secs(2) && second <= Duration::from_millis(2500));
        let capped = policy.calculate_delay(6);
        assert!(capped >= Duration::from_secs(5) && capped <= Duration::from_millis(5500));
    }

    #[test]
    fn test_jitter_within_bounds() {
        for _ in 0..100 {
            assert!(calculate_jitter() <= MAX_JITTER);
        }
    }

    #[test]
    fn test_classify_http_statuses() {
        let cases = [
            (400, FailureType::Permanent),
            (404, FailureType::Permanent),
            (408, FailureType::Transient),
            (410, FailureType::Permanent),
            (429, FailureType::RateLimited),
            (500, FailureType::Transient),
            (503, FailureType::Transient),
            (599, FailureType::Transient),
            (302, FailureType::Permanent),
        ];
        for (status, expected) in cases {
            assert_eq!(
                classify_error(&ProviderError::http_status(URL, status)),
                expected,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_classify_auth_rejection_needs_auth() {
        assert_eq!(
            classify_error(&ProviderError::auth_rejected(URL, 401)),
            FailureType::NeedsAuth
        );
    }

    #[test]
    fn test_classify_local_failures_permanent() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            classify_error(&ProviderError::io("/tmp/x", io_err)),
            FailureType::Permanent
        );
        assert_eq!(
            classify_error(&ProviderError::invalid_url("nope")),
            FailureType::Permanent
        );
        assert_eq!(
            classify_error(&ProviderError::timeout(URL)),
            FailureType::Transient
        );
    }

    #[test]
    fn test_should_retry_respects_failure_type() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.should_retry(FailureType::Permanent, 1),
            RetryDecision::DoNotRetry { .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::NeedsAuth, 1),
            RetryDecision::DoNotRetry { .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::RateLimited, 1),
            RetryDecision::Retry { attempt: 2, .. }
        ));
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::with_max_attempts(3);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 2),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        match policy.should_retry(FailureType::Transient, 3) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("exhausted")),
            other => panic!("expected DoNotRetry, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("  120 "), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn test_parse_retry_after_caps_at_one_hour() {
        assert_eq!(parse_retry_after("7200"), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_parse_retry_after_http_date_in_past_is_zero() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_retry_after_hint_only_for_status_with_header() {
        let limited = ProviderError::http_status_with_retry_after(URL, 429, Some("7".to_string()));
        assert_eq!(retry_after_hint(&limited), Some(Duration::from_secs(7)));
        assert_eq!(retry_after_hint(&ProviderError::http_status(URL, 429)), None);
        assert_eq!(retry_after_hint(&ProviderError::timeout(URL)), None);
    }
}
