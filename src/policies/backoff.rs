//! # Backoff between listener attempts.
//!
//! [`BackoffPolicy`] computes how long a delivery waits after failed attempt `n`
//! before attempt `n + 1`:
//!
//! ```text
//! delay(n) = min(first × factor^(n-1), max)   then jitter
//! ```
//!
//! The base is a pure function of the attempt number, so jitter never feeds
//! back into later delays. Without jitter and with `factor >= 1.0` the
//! sequence is non-decreasing.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use eventvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay_after(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay_after(2), Duration::from_millis(200));
//! assert_eq!(backoff.delay_after(3), Duration::from_millis(400));
//! assert_eq!(backoff.delay_after(9), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Exponential backoff with a cap and optional jitter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub first: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Growth multiplier per failed attempt (`>= 1.0` for non-decreasing delays).
    pub factor: f64,
    /// Randomization applied to the capped base delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Constant delay of `every` between attempts.
    pub fn constant(every: Duration) -> Self {
        Self {
            first: every,
            max: every,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns a copy with a different jitter policy.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Capped delay before jitter for failed attempt `failed_attempt` (1-based).
    ///
    /// Non-finite or negative intermediate values clamp to `max`.
    pub fn base_delay(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Delay to wait after failed attempt `failed_attempt` (1-based), jitter applied.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let base = self.base_delay(failed_attempt);
        match self.jitter {
            JitterPolicy::Decorrelated => {
                let floor = self.first.min(self.max);
                self.jitter.decorrelated(floor, base, self.max)
            }
            jitter => jitter.apply(base),
        }
    }
}
