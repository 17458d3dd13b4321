use std::time::Duration;

use reqwest::StatusCode;

/// Total request attempts per completion call, the first one included.
pub const MAX_ATTEMPTS: u32 = 5;
/// Delay before the first retry; doubles on every further retry.
pub const BASE_DELAY: Duration = Duration::from_secs(2);

/// Only rate limiting and overload are treated as transient.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Exponential backoff: `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(30)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    /// `exhausted` is set when the failure was transient but no attempts remain.
    GiveUp { exhausted: bool },
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(self.base_delay, attempt)
    }

    #[must_use]
    pub fn is_last_attempt(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) >= self.max_attempts
    }

    /// Decides what follows a failed attempt that observed `status`.
    ///
    /// `None` means no HTTP status was available (e.g. connection reset).
    #[must_use]
    pub fn decide(&self, attempt: u32, status: Option<StatusCode>) -> RetryDecision {
        if !status.is_some_and(is_retryable_status) {
            return RetryDecision::GiveUp { exhausted: false };
        }
        if self.is_last_attempt(attempt) {
            return RetryDecision::GiveUp { exhausted: true };
        }
        RetryDecision::RetryAfter(self.delay_for(attempt))
    }
}

/// Per-call retry bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub last_status: Option<StatusCode>,
    pub last_error: Option<String>,
}

impl RetryState {
    pub fn record_failure(&mut self, status: Option<StatusCode>, message: impl Into<String>) {
        if status.is_some() {
            self.last_status = status;
        }
        self.last_error = Some(message.into());
    }

    pub fn advance(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }
}
