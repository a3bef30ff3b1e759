//! Retry classification and backoff
//!
//! Failures are split into transient (worth another attempt) and permanent
//! (record and move on). Transient failures are retried with exponential
//! backoff plus jitter, up to the configured attempt budget. The policy is
//! pure computation: scheduling the delayed re-entry belongs to the
//! frontier, waiting belongs to the worker.

use crate::config::RetryConfig;
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Jitter applied to backoff delays, as a fraction of the computed delay.
const JITTER_FRACTION: f64 = 0.2;

/// What went wrong with a fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The request exceeded the per-request timeout
    Timeout,
    /// Connection-level failure (refused, reset, DNS)
    Network,
    /// The server answered with a non-success status
    HttpStatus(u16),
    /// robots.txt disallows this URL
    RobotsDenied,
    /// The URL could not be parsed or resolved
    MalformedUrl,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::HttpStatus(code) => write!(f, "HTTP {}", code),
            FailureKind::RobotsDenied => write!(f, "disallowed by robots.txt"),
            FailureKind::MalformedUrl => write!(f, "malformed URL"),
        }
    }
}

/// Verdict on a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Transient failure with budget remaining: schedule another attempt
    Retry,
    /// Permanent failure or budget exhausted: record and move on
    Fatal,
}

/// Failure classification and backoff schedule
///
/// Transient kinds are timeouts, connection errors, and the retryable
/// status codes (429 and the 5xx range). Everything else, including the
/// remaining 4xx responses, is permanent on the first occurrence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy from the retry configuration
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }

    /// Whether a failure kind is transient
    pub fn is_retryable(kind: &FailureKind) -> bool {
        match kind {
            FailureKind::Timeout | FailureKind::Network => true,
            FailureKind::HttpStatus(code) => *code == 429 || (500..600).contains(code),
            FailureKind::RobotsDenied | FailureKind::MalformedUrl => false,
        }
    }

    /// Classifies a failed attempt
    ///
    /// # Arguments
    ///
    /// * `kind` - The failure observed
    /// * `attempts` - Attempts made so far, including the one that failed
    pub fn classify(&self, kind: &FailureKind, attempts: u32) -> Decision {
        if Self::is_retryable(kind) && attempts < self.max_attempts {
            Decision::Retry
        } else {
            Decision::Fatal
        }
    }

    /// Backoff delay before the next attempt
    ///
    /// Attempt 1 waits the base delay, each further attempt doubles it, and
    /// the result is capped at the configured maximum. A random jitter of
    /// up to ±20% is applied so workers retrying against the same host do
    /// not synchronize.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let scaled = self.base_delay.as_secs_f64() * 2f64.powi(exponent as i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());

        let jitter = rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
        let jittered = (capped * (1.0 + jitter)).max(0.0);
        Duration::from_secs_f64(jittered)
    }

    /// The configured attempt budget
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
