//! Retry policy for transient storage contention

use std::time::Duration;

/// Bounded exponential backoff
///
/// Attempt `n` (zero-based) that fails with a transient error is followed by a
/// pause of `base_backoff * 2^n` before attempt `n + 1`. No pause follows the
/// last attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts per operation, including the first one
    pub max_attempts: u32,
    /// Backoff unit, doubled after every failed attempt
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_micros(10),
        }
    }
}

impl RetryPolicy {
    /// Create a policy, falling back to defaults for zero values
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        let default = Self::default();

        let max_attempts = if max_attempts == 0 {
            tracing::warn!(
                max_attempts,
                default = default.max_attempts,
                "invalid max_attempts, using default"
            );
            default.max_attempts
        } else {
            max_attempts
        };

        let base_backoff = if base_backoff.is_zero() {
            tracing::warn!(
                default_us = default.base_backoff.as_micros() as u64,
                "invalid base_backoff, using default"
            );
            default.base_backoff
        } else {
            base_backoff
        };

        Self {
            max_attempts,
            base_backoff,
        }
    }

    /// Delay after the failed attempt with the given zero-based index
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << attempt.min(20))
    }
}
