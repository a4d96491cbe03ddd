use crate::core::TtlError;
use std::time::Duration;

/// Bounded retry with exponential backoff around `list`/`delete` calls.
///
/// `max_attempts` counts the first call, so the default of 1 never retries
/// and failures wait for the next notification or resync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff after the first failed attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for any single backoff, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Returns `true` when `err`, raised by attempt number `attempt`
    /// (1-based), should be followed by another attempt.
    pub fn should_retry(&self, attempt: u32, err: &TtlError) -> bool {
        attempt < self.max_attempts.max(1) && err.is_retryable()
    }

    /// Delay before the attempt following attempt number `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff_ms.max(1);
        let cap = self.max_backoff_ms.max(base);

        let mut backoff = base;
        for _ in 1..attempt {
            backoff = backoff.saturating_mul(2).min(cap);
        }
        Duration::from_millis(backoff)
    }
}
