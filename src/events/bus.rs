//! # Report bus.
//!
//! [`ReportBus`] wraps [`tokio::sync::broadcast`] so the dispatcher can publish
//! [`Report`]s from the drain loop and every delivery task without blocking.
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receivers the report is dropped.
//! - Capacity is a single ring buffer shared by all receivers.
//! - Slow receivers observe `RecvError::Lagged(n)` and skip the `n` oldest reports.

use tokio::sync::broadcast;

use super::report::Report;

/// Broadcast channel for dispatch reports. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ReportBus {
    tx: broadcast::Sender<Report>,
}

impl ReportBus {
    /// Creates a new bus; capacity is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Report>(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, report: Report) {
        let _ = self.tx.send(report);
    }

    /// Creates a receiver that observes reports published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Report> {
        self.tx.subscribe()
    }
}
