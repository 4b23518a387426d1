//! Retry policies for transient memory access failures.

use std::time::Duration;

/// Decides whether a failed attempt is retried, and after how long.
pub trait RetryStrategy: Send + Sync {
    /// Delay before the next attempt, given the number of attempts that have
    /// failed so far (starting at 1). `None` means give up.
    fn next_delay(&self, failed_attempts: u32) -> Option<Duration>;

    /// Total attempts made before giving up, if bounded.
    fn max_attempts(&self) -> Option<u32>;
}

/// Same delay between every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    pub attempts: u32,
    pub delay: Duration,
}

impl FixedDelay {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(10))
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, failed_attempts: u32) -> Option<Duration> {
        (failed_attempts < self.attempts).then_some(self.delay)
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(self.attempts)
    }
}

/// Delay doubling after every failure, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts,
            initial_delay,
            max_delay,
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts >= self.attempts {
            return None;
        }
        let factor = 1u32.checked_shl(failed_attempts - 1).unwrap_or(u32::MAX);
        let delay = self
            .initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(self.attempts)
    }
}

/// Fail on the first error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_delay(&self, _failed_attempts: u32) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(1)
    }
}
