//! Retry policy: eligibility of errored work, and poll backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Has an item with `error_count` failures not yet used up its attempts?
///
/// One attempt is the original try, plus `max_retries` retries.
pub fn is_retry_eligible(error_count: u32, max_retries: u32) -> bool {
    error_count < max_retries.saturating_add(1)
}

/// Retry limits for one job type.
///
/// `max_retries_for_error` bounds automatic re-claims of a single task.
/// `max_job_errors` is an independent job-level ceiling on the errors summed
/// across all tasks of a job; `None` means the job-level check is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries_for_error: u32,
    pub max_job_errors: Option<u32>,
}

impl RetryPolicy {
    pub fn new(max_retries_for_error: u32) -> Self {
        Self {
            max_retries_for_error,
            max_job_errors: None,
        }
    }

    pub fn with_max_job_errors(mut self, max_job_errors: u32) -> Self {
        self.max_job_errors = Some(max_job_errors);
        self
    }

    /// Exclusive upper bound on the error count of a claimable item.
    pub fn error_count_ceiling(&self) -> u32 {
        self.max_retries_for_error.saturating_add(1)
    }

    pub fn is_task_retry_eligible(&self, error_count: u32) -> bool {
        is_retry_eligible(error_count, self.max_retries_for_error)
    }

    pub fn is_job_exhausted(&self, job_error_count: u32) -> bool {
        self.max_job_errors
            .is_some_and(|max| job_error_count >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Backoff between poll cycles after a failed claim.
///
/// delay = base_delay * multiplier^(failures - 1), capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl PollBackoff {
    pub fn new(base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            base_delay,
            multiplier,
            max_delay,
        }
    }

    /// Delay before the next poll after `failures` consecutive failures
    /// (1-indexed; 0 is treated as 1).
    /// A multiplier below 1.0 (or NaN) is treated as 1.0.
    pub fn next_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let multiplier = if self.multiplier >= 1.0 { self.multiplier } else { 1.0 };
        let delay_secs = self.base_delay.as_secs_f64() * multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs)
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 2.0, Duration::from_secs(5))
    }
}
