//! Delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::report::DeliveryStatus;

#[derive(Default)]
pub(crate) struct Counters {
    emitted: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    partially_failed: AtomicU64,
    failed: AtomicU64,
    unrouted: AtomicU64,
}

impl Counters {
    pub(crate) fn emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn finished(&self, status: DeliveryStatus) {
        let counter = match status {
            DeliveryStatus::Delivered => &self.delivered,
            DeliveryStatus::PartiallyFailed => &self.partially_failed,
            DeliveryStatus::Failed => &self.failed,
            DeliveryStatus::Unrouted => &self.unrouted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            partially_failed: self.partially_failed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a dispatcher's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events accepted into the queue.
    pub emitted: u64,
    /// Emits refused (full or closed queue).
    pub rejected: u64,
    /// Events evicted from a full queue.
    pub dropped: u64,
    pub delivered: u64,
    pub partially_failed: u64,
    pub failed: u64,
    pub unrouted: u64,
}

impl DispatchStats {
    /// Events whose delivery has finished, whatever the outcome.
    pub fn finished(&self) -> u64 {
        self.delivered + self.partially_failed + self.failed + self.unrouted
    }
}
