//! Event records and dispatch reports.
//!
//! ## Contents
//! - [`Event`], [`EmitRequest`], [`Priority`] the data model producers and listeners share
//! - [`Report`], [`ReportKind`] diagnostics published while events are delivered
//! - [`ReportBus`] thin wrapper over `tokio::sync::broadcast` carrying reports
//!
//! ## Quick reference
//! - **Publishers**: the drain loop (drops, unrouted events) and delivery tasks
//!   (attempts, backoff, terminal outcomes).
//! - **Consumers**: anything holding a receiver from
//!   [`Dispatcher::reports`](crate::Dispatcher::reports).

mod bus;
mod event;
mod report;

pub use bus::ReportBus;
pub use event::{EmitRequest, Event, Priority};
pub use report::{Report, ReportKind};
