//! # Dispatcher configuration.
//!
//! Provides [`DispatcherConfig`], the settings supplied when a
//! [`Dispatcher`](crate::Dispatcher) is built. Nothing here is hardcoded
//! elsewhere in the crate.
//!
//! ## Sentinel values
//! - `handler_timeout = 0s` → no timeout
//! - `max_in_flight = 0` → unlimited concurrent event deliveries
//! - `queue_capacity = 0` → unbounded queue

use std::time::Duration;

use crate::policies::RetryPolicy;
use crate::queue::OverflowPolicy;

/// Configuration for a dispatcher instance.
///
/// ## Field semantics
/// - `retry`: attempts per listener per event and the backoff between them
/// - `handler_timeout`: bound on a single attempt (`0s` = unbounded)
/// - `max_in_flight`: non-critical events being delivered at once (`0` = unlimited)
/// - `queue_capacity`: pending events before `overflow` applies (`0` = unbounded)
/// - `overflow`: what a full queue does with new events
/// - `report_capacity`: ring buffer size of the report bus (min 1)
/// - `shutdown_grace`: how long `shutdown` waits for in-flight deliveries
///
/// ## Notes
/// Fields are public; prefer the accessors below over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Retry and backoff applied to every listener delivery.
    pub retry: RetryPolicy,

    /// Per-attempt timeout.
    ///
    /// A timed-out attempt is not cancelled; its eventual result is discarded
    /// and the attempt counts as failed.
    pub handler_timeout: Duration,

    /// Maximum number of events in delivery at the same time.
    ///
    /// The drain loop only dequeues when a slot is free, which is what keeps
    /// higher priorities ahead under load. Critical events bypass the limit
    /// and do not occupy a slot.
    pub max_in_flight: usize,

    /// Maximum number of pending events.
    pub queue_capacity: usize,

    /// Behavior of a full queue.
    pub overflow: OverflowPolicy,

    /// Capacity of the report broadcast channel.
    pub report_capacity: usize,

    /// Grace period for in-flight deliveries during shutdown.
    pub shutdown_grace: Duration,
}

impl DispatcherConfig {
    /// Per-attempt timeout as an `Option` (`None` = no timeout).
    #[inline]
    pub fn handler_timeout(&self) -> Option<Duration> {
        if self.handler_timeout == Duration::ZERO {
            None
        } else {
            Some(self.handler_timeout)
        }
    }

    /// In-flight limit as an `Option` (`None` = unlimited).
    #[inline]
    pub fn in_flight_limit(&self) -> Option<usize> {
        match self.max_in_flight {
            0 => None,
            n => Some(n),
        }
    }

    /// Queue capacity as an `Option` (`None` = unbounded).
    #[inline]
    pub fn queue_limit(&self) -> Option<usize> {
        match self.queue_capacity {
            0 => None,
            n => Some(n),
        }
    }

    /// Report bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn report_capacity_clamped(&self) -> usize {
        self.report_capacity.max(1)
    }
}

impl Default for DispatcherConfig {
    /// Default configuration:
    ///
    /// - `retry = RetryPolicy::default()` (3 attempts, 100ms × 2 up to 30s)
    /// - `handler_timeout = 5s`
    /// - `max_in_flight = 64`
    /// - `queue_capacity = 10_000`, `overflow = DropOldestLowerPriority`
    /// - `report_capacity = 1024`
    /// - `shutdown_grace = 10s`
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            handler_timeout: Duration::from_secs(5),
            max_in_flight: 64,
            queue_capacity: 10_000,
            overflow: OverflowPolicy::default(),
            report_capacity: 1024,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}
