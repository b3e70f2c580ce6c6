//! # eventvisor
//!
//! **Eventvisor** is an in-process, priority-aware event dispatcher for Rust.
//!
//! Producers emit named events with a JSON payload and return immediately;
//! a single drain loop delivers them to every matching listener, oldest first
//! within each of four priorities, with a per-attempt timeout and retries with
//! exponential backoff. Critical events can be awaited until every listener
//! has finished with them, and a bridge forwards selected events to an
//! analytics sink.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   emit / emit_with / emit_critical
//!            │ validate + stamp (id, timestamp)
//!            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher                                                       │
//! │  - EventQueue  [Critical][High][Normal][Low]  (FIFO per bucket)   │
//! │  - Registry    exact / `prefix.*` / `*` listeners                 │
//! │  - ReportBus   broadcast of dispatch reports                      │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ drain loop: highest priority, oldest first
//!        ▼
//!   resolve(name) ──► one delivery per matching listener (concurrent)
//!        │
//!     ┌──┴───────────────┬──────────────────┐
//!     ▼                  ▼                  ▼
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │  delivery    │   │  delivery    │   │   Bridge     │──► AnalyticsSink
//!  │ (retry loop) │   │ (retry loop) │   │ (retry loop) │
//!  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!         │ Publishes: AttemptStarting, AttemptFailed, TimeoutHit,
//!         │            BackoffScheduled, ListenerSucceeded, ListenerExhausted
//!         ▼
//!   DeliveryReport ──► EventDelivered / EventFailed / EventUnrouted
//!                  └─► emit_critical caller (critical events only)
//! ```
//!
//! ### Delivery of one event to one listener
//! ```text
//! loop {
//!   ├─► unregistered?            → Removed
//!   ├─► attempt += 1
//!   ├─► handle(event) bounded by handler_timeout, panics contained
//!   │       ├─ Ok  ──► Succeeded
//!   │       └─ Err ──► attempts left and error retryable?
//!   │                   ├─ no  ─► Failed(err)
//!   │                   └─ yes ─► sleep(backoff(attempt)) and continue
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Dispatch**      | Emit, await critical events, register listeners, shut down.  | [`Dispatcher`], [`DispatcherBuilder`]       |
//! | **Listeners**     | Async handlers on exact or wildcard patterns.                | [`Listener`], [`ListenerFn`], [`Pattern`]   |
//! | **Policies**      | Attempts, backoff and jitter.                                | [`RetryPolicy`], [`BackoffPolicy`]          |
//! | **Reports**       | Observe dispatch as it happens, read counters.               | [`Report`], [`ReportKind`], [`DispatchStats`] |
//! | **Bridge**        | Forward events to an analytics service.                      | [`Bridge`], [`AnalyticsSink`], [`LogSink`]  |
//! | **Errors**        | Typed errors for emit, handlers, delivery and sinks.         | [`EmitError`], [`HandlerError`], [`DeliveryError`] |
//! | **Configuration** | Centralize dispatcher settings.                              | [`DispatcherConfig`]                        |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use eventvisor::{Dispatcher, DispatcherConfig, Event, HandlerError, ListenerFn, ListenerRef, Priority};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = DispatcherConfig::default();
//!     cfg.handler_timeout = Duration::from_secs(2);
//!
//!     let forms: ListenerRef = ListenerFn::arc("forms", |ev: Arc<Event>| async move {
//!         println!("form event {} {}", ev.name, ev.payload);
//!         Ok::<(), HandlerError>(())
//!     });
//!
//!     let dispatcher = Dispatcher::builder(cfg)
//!         .with_listener("form.*", forms)
//!         .build()?;
//!
//!     dispatcher.emit_with("form.submit", json!({ "form_id": "signup" }), Priority::High)?;
//!     dispatcher.emit_critical("form.reset", json!({})).await?;
//!
//!     dispatcher.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod bridge;
mod core;
mod error;
mod events;
mod listeners;
mod policies;
mod queue;

// ---- Public re-exports ----

pub use bridge::{AnalyticsSink, Bridge, BridgeConfig, LogSink, TrackedEvent};
pub use core::{
    DeliveryReport, DeliveryStatus, DispatchStats, Dispatcher, DispatcherBuilder,
    DispatcherConfig, ListenerOutcome, ListenerStatus,
};
pub use error::{DeliveryError, EmitError, HandlerError, RuntimeError, SinkError};
pub use events::{EmitRequest, Event, Priority, Report, ReportKind};
pub use listeners::{Listener, ListenerFn, ListenerId, ListenerRef, Pattern};
pub use policies::{BackoffPolicy, JitterPolicy, RetryPolicy};
pub use queue::{OverflowPolicy, PriorityQueue};
