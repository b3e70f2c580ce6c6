//! # Retry policy for listener deliveries.
//!
//! [`RetryPolicy`] bounds how many times one listener is invoked for one event
//! and how long to wait between attempts.
//!
//! ```text
//! attempt 1 ─► Err ─► sleep(backoff.delay_after(1)) ─► attempt 2 ─► Err ─► ... ─► attempt max_attempts ─► Exhausted
//!            └► Ok ─► Succeeded
//!            └► Fatal ─► Exhausted (no further attempts)
//! ```

use std::time::Duration;

use crate::error::HandlerError;
use crate::policies::BackoffPolicy;

/// How many attempts a delivery gets and how retries are spaced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (min 1).
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    /// Three attempts with [`BackoffPolicy::default`].
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffPolicy::default(),
        }
    }

    /// `max_attempts` clamped to a minimum of 1.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Returns the delay before the next attempt, or `None` when the delivery is over.
    pub fn next_delay(&self, failed_attempt: u32, err: &HandlerError) -> Option<Duration> {
        if !err.is_retryable() || failed_attempt >= self.attempts() {
            return None;
        }
        Some(self.backoff.delay_after(failed_attempt))
    }
}
