//! Retry policy for contended writes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff schedule for acquiring the store's write lock.
///
/// Failed attempt `n` (zero-based) sleeps
/// `base_delay * backoff_multiplier^n` before the next try; once
/// `max_attempts` tries are spent the write is abandoned as lock
/// exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after failed attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .mul_f64(self.backoff_multiplier.powi(attempt as i32))
    }
}
