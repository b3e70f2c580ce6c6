//! # Logging sink for development and demos.
//!
//! [`LogSink`] writes every tracked event to `tracing` at INFO level instead
//! of sending it anywhere.
//!
//! ## Output format
//! ```text
//! INFO tracked event=form_submit properties={"form_id":"signup","event_id":3,...}
//! ```

use async_trait::async_trait;

use crate::bridge::sink::{AnalyticsSink, TrackedEvent};
use crate::error::SinkError;

/// Sink that logs tracked events and always succeeds.
///
/// Not intended for production use; implement [`AnalyticsSink`] for the
/// real analytics backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl AnalyticsSink for LogSink {
    async fn track(&self, event: TrackedEvent) -> Result<(), SinkError> {
        let properties = serde_json::Value::Object(event.properties);
        tracing::info!(event = %event.name, %properties, "tracked");
        Ok(())
    }
}
