//! # Bridge from dispatcher events to an analytics sink.
//!
//! [`Bridge`] is a standing [`Listener`]: attach it with
//! [`Dispatcher::attach_bridge`](crate::Dispatcher::attach_bridge) and every
//! event matching one of its patterns is mapped to a [`TrackedEvent`] and
//! handed to the sink.
//!
//! ## Mapping
//! ```text
//! name:        renames[name]  or  name with '.' → '_'     form.submit → form_submit
//! properties:  object payload → copied as-is
//!              other payload  → {"value": payload}
//!              include_metadata → + event_id, priority, source (if set), emitted_at_ms
//! timestamp:   event.timestamp
//! ```
//!
//! Metadata keys overwrite payload keys of the same name.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{Bridge, BridgeConfig, Dispatcher, DispatcherConfig, LogSink};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::builder(DispatcherConfig::default()).build()?;
//! let bridge = Bridge::new(
//!     LogSink,
//!     BridgeConfig::new(["form.*", "page.view"]).rename("page.view", "$pageview"),
//! );
//! let ids = dispatcher.attach_bridge(Arc::new(bridge))?;
//! assert_eq!(ids.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::bridge::sink::{AnalyticsSink, TrackedEvent};
use crate::error::HandlerError;
use crate::events::Event;
use crate::listeners::Listener;

/// Which events a [`Bridge`] forwards and how they are renamed.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Listener patterns the bridge is registered on.
    pub patterns: Vec<String>,
    /// Explicit internal name → analytics name table.
    pub renames: HashMap<String, String>,
    /// Adds `event_id`, `priority`, `source` and `emitted_at_ms` to the properties.
    pub include_metadata: bool,
}

impl BridgeConfig {
    /// Forwards events matching any of `patterns`, with metadata.
    pub fn new<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            renames: HashMap::new(),
            include_metadata: true,
        }
    }

    /// Maps the internal event `from` to the analytics name `to`.
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }
}

impl Default for BridgeConfig {
    /// Forwards everything (`*`) with metadata and no renames.
    fn default() -> Self {
        Self::new(["*"])
    }
}

/// Listener that maps events to the analytics schema and forwards them to `S`.
pub struct Bridge<S> {
    sink: Arc<S>,
    cfg: BridgeConfig,
}

impl<S: AnalyticsSink> Bridge<S> {
    pub fn new(sink: S, cfg: BridgeConfig) -> Self {
        Self::with_shared_sink(Arc::new(sink), cfg)
    }

    /// Builds a bridge around a sink the caller keeps a handle to.
    pub fn with_shared_sink(sink: Arc<S>, cfg: BridgeConfig) -> Self {
        Self { sink, cfg }
    }

    pub fn patterns(&self) -> &[String] {
        &self.cfg.patterns
    }

    /// Analytics name for an internal event name.
    pub fn map_name(&self, name: &str) -> String {
        match self.cfg.renames.get(name) {
            Some(renamed) => renamed.clone(),
            None => name.replace('.', "_"),
        }
    }

    /// Maps an event to the analytics schema.
    pub fn to_tracked(&self, event: &Event) -> TrackedEvent {
        let mut properties = match &event.payload {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_owned(), other.clone());
                map
            }
        };

        if self.cfg.include_metadata {
            properties.insert("event_id".to_owned(), Value::from(event.id));
            properties.insert("priority".to_owned(), Value::from(event.priority.as_str()));
            if let Some(source) = &event.source {
                properties.insert("source".to_owned(), Value::from(&**source));
            }
            properties.insert("emitted_at_ms".to_owned(), Value::from(event.timestamp_ms()));
        }

        TrackedEvent {
            name: self.map_name(&event.name),
            properties,
            timestamp: event.timestamp,
        }
    }
}

#[async_trait]
impl<S: AnalyticsSink> Listener for Bridge<S> {
    fn name(&self) -> &str {
        "analytics-bridge"
    }

    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError> {
        let tracked = self.to_tracked(&event);
        self.sink.track(tracked).await.map_err(|err| {
            tracing::debug!(event = %event.name, event_id = event.id, error = %err, "sink refused event");
            HandlerError::from(err)
        })
    }
}

impl<S> std::fmt::Debug for Bridge<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge").field("cfg", &self.cfg).finish()
    }
}
