//! Retry and backoff policies.
//!
//! ## Contents
//! - [`RetryPolicy`] how many attempts a listener gets per event
//! - [`BackoffPolicy`] how delays grow between attempts (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization of those delays
//!
//! ## Quick wiring
//! ```text
//! DispatcherConfig { retry: RetryPolicy { max_attempts, backoff }, handler_timeout, .. }
//!      └─► core::delivery uses:
//!           - retry.next_delay(attempt, &err) to decide retry vs give up
//!           - handler_timeout to bound every attempt
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 3 attempts.
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=30s, jitter=None.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
