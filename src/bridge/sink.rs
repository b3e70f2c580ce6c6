//! # Analytics sink abstraction.
//!
//! A sink is the outside analytics service the [`Bridge`](crate::Bridge)
//! forwards to. It receives already-mapped [`TrackedEvent`]s and reports
//! whether the service accepted them.

use std::time::SystemTime;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SinkError;

/// Event in the analytics schema: a flat name plus a property bag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedEvent {
    /// Analytics event name (e.g. `form_submit`).
    pub name: String,
    /// Properties sent along with the event.
    pub properties: Map<String, Value>,
    /// When the original event was emitted.
    pub timestamp: SystemTime,
}

impl TrackedEvent {
    /// Returns a property by key.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Destination for tracked events.
///
/// Return [`SinkError::Unavailable`] for transient failures (the bridge
/// retries them) and [`SinkError::Rejected`] for events that will never be
/// accepted.
#[async_trait]
pub trait AnalyticsSink: Send + Sync + 'static {
    /// Sends one event to the analytics service.
    async fn track(&self, event: TrackedEvent) -> Result<(), SinkError>;
}
