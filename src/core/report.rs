//! # Per-event delivery outcome.
//!
//! A [`DeliveryReport`] is assembled once every delivery of an event has
//! reached a terminal state. It is what `emit_critical` resolves with, and
//! its [`status`](DeliveryReport::status) decides which terminal
//! [`ReportKind`](crate::ReportKind) is published.

use std::sync::Arc;

use crate::error::HandlerError;
use crate::events::Event;
use crate::listeners::ListenerId;

/// Terminal state of one listener for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerStatus {
    /// An attempt returned `Ok(())`.
    Succeeded,
    /// Attempts exhausted, a fatal error, or shutdown during backoff; holds the last error.
    Failed(HandlerError),
    /// Listener was unregistered before its next attempt.
    Removed,
}

/// Outcome for one listener.
#[derive(Debug, Clone)]
pub struct ListenerOutcome {
    pub id: ListenerId,
    pub listener: Arc<str>,
    /// Attempts actually started.
    pub attempts: u32,
    pub status: ListenerStatus,
}

impl ListenerOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, ListenerStatus::Failed(_))
    }
}

/// Aggregate classification of a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// No listener failed.
    Delivered,
    /// Some, but not all, listeners failed.
    PartiallyFailed,
    /// Every listener failed.
    Failed,
    /// Nothing matched the event.
    Unrouted,
}

/// Outcome of delivering one event to all of its listeners.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub event: Arc<Event>,
    /// One entry per resolved listener, in registration order.
    pub outcomes: Vec<ListenerOutcome>,
}

impl DeliveryReport {
    pub fn status(&self) -> DeliveryStatus {
        let failed = self.failed_count();
        if self.outcomes.is_empty() {
            DeliveryStatus::Unrouted
        } else if failed == 0 {
            DeliveryStatus::Delivered
        } else if failed == self.outcomes.len() {
            DeliveryStatus::Failed
        } else {
            DeliveryStatus::PartiallyFailed
        }
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    /// True when no listener failed (an unrouted event counts as success).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Outcome of the listener with the given name, if it was resolved.
    pub fn outcome(&self, listener: &str) -> Option<&ListenerOutcome> {
        self.outcomes.iter().find(|o| &*o.listener == listener)
    }
}
