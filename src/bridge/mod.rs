//! # Analytics bridge.
//!
//! - [`AnalyticsSink`] async destination, [`TrackedEvent`] its schema
//! - [`Bridge`], [`BridgeConfig`] listener mapping events onto that schema
//! - [`LogSink`] sink that only logs

mod adapter;
mod log_sink;
mod sink;

pub use adapter::{Bridge, BridgeConfig};
pub use log_sink::LogSink;
pub use sink::{AnalyticsSink, TrackedEvent};
