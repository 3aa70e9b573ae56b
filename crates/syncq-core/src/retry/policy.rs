use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// `base * 2^(attempt-1)`, capped at `max_delay`.
    Exponential,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempts exhausted; the job becomes Failed.
    NoRetry,
    /// Re-queue the job, eligible again after the given delay.
    RetryAfter(Duration),
}

/// Backoff policy applied by the worker pool to every handler failure.
///
/// All failures are treated alike; the only input is how many attempts the
/// job has used against its own `max_retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub strategy: BackoffStrategy,
    /// Delay for a fixed strategy, first delay for exponential.
    pub base_delay: Duration,
    /// Upper bound on exponential delays.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Retry immediately; used by tests and callers that want no delay.
    pub fn immediate() -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            base_delay: delay,
            max_delay: delay,
        }
    }

    pub fn exponential(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_delay,
            max_delay,
        }
    }

    /// Decide what happens after a failed attempt.
    ///
    /// `attempt_count` is the number of handler invocations so far (1 after
    /// the first failure). A job may run at most `max_retries + 1` times.
    pub fn decide(&self, attempt_count: u32, max_retries: u32) -> RetryDecision {
        if attempt_count > max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt_count))
    }

    /// Backoff delay before attempt `attempt_count + 1`.
    pub fn delay_for(&self, attempt_count: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let exp = 1u32 << attempt_count.saturating_sub(1).min(16);
                self.base_delay.saturating_mul(exp).min(self.max_delay)
            }
        }
    }
}
