//! Dispatcher core: queueing, delivery and lifecycle.
//!
//! The public surface is [`Dispatcher`] (built through [`DispatcherBuilder`]),
//! its [`DispatcherConfig`] and the delivery results it hands back.
//!
//! Internal modules:
//! - [`dispatcher`]: owns the queue and registry, runs the drain loop, handles shutdown;
//! - [`delivery`]: drives one `(event, listener)` pair through retries and backoff;
//! - [`runner`]: executes one attempt with timeout and panic containment;
//! - [`stats`]: counters behind [`DispatchStats`].

mod builder;
mod config;
mod delivery;
mod dispatcher;
mod report;
mod runner;
mod stats;

pub use builder::DispatcherBuilder;
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use report::{DeliveryReport, DeliveryStatus, ListenerOutcome, ListenerStatus};
pub use stats::DispatchStats;
