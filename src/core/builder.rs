use std::sync::Arc;

use crate::bridge::{AnalyticsSink, Bridge};
use crate::core::config::DispatcherConfig;
use crate::core::dispatcher::Dispatcher;
use crate::error::EmitError;
use crate::listeners::ListenerRef;

/// Builder for constructing a [`Dispatcher`] with listeners registered up front.
pub struct DispatcherBuilder {
    cfg: DispatcherConfig,
    listeners: Vec<(String, ListenerRef)>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: DispatcherConfig) -> Self {
        Self {
            cfg,
            listeners: Vec::new(),
        }
    }

    /// Registers `listener` on `pattern` when the dispatcher is built.
    pub fn with_listener(mut self, pattern: impl Into<String>, listener: ListenerRef) -> Self {
        self.listeners.push((pattern.into(), listener));
        self
    }

    /// Registers an analytics bridge on each of its configured patterns.
    pub fn with_bridge<S: AnalyticsSink>(mut self, bridge: Arc<Bridge<S>>) -> Self {
        let listener: ListenerRef = bridge.clone();
        for pattern in bridge.patterns() {
            self.listeners.push((pattern.clone(), Arc::clone(&listener)));
        }
        self
    }

    /// Builds the dispatcher and starts its drain loop.
    ///
    /// Fails with [`EmitError::InvalidPattern`] if any registered pattern is
    /// malformed; in that case nothing keeps running.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn build(self) -> Result<Arc<Dispatcher>, EmitError> {
        let dispatcher = Dispatcher::start(self.cfg);
        for (pattern, listener) in self.listeners {
            dispatcher.on(&pattern, listener)?;
        }
        Ok(dispatcher)
    }
}
