//! # Dispatch reports emitted while events are delivered.
//!
//! The [`ReportKind`] enum classifies what the dispatcher did with an event:
//! - **Attempt reports**: one listener attempt starting, failing, timing out, panicking
//! - **Retry reports**: backoff scheduled before the next attempt
//! - **Terminal reports**: event delivered, failed, unrouted or dropped
//!
//! A [`Report`] carries the metadata for its kind. Reports are diagnostics for
//! observers and tests; they never influence delivery.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use eventvisor::{Report, ReportKind};
//!
//! let r = Report::new(ReportKind::BackoffScheduled)
//!     .with_event(7, "form.submit")
//!     .with_listener("crm")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(200));
//!
//! assert_eq!(r.delay_ms, Some(200));
//! assert_eq!(r.listener.as_deref(), Some("crm"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for reports.
static REPORT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of dispatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    // === Attempt reports ===
    /// A listener attempt is about to start.
    ///
    /// Sets: `event_id`, `event_name`, `listener`, `attempt`
    AttemptStarting,

    /// A listener attempt failed (error or panic).
    ///
    /// Sets: `event_id`, `event_name`, `listener`, `attempt`, `reason`
    AttemptFailed,

    /// A listener attempt exceeded the handler timeout; its late result is ignored.
    ///
    /// Sets: `event_id`, `event_name`, `listener`, `attempt`, `timeout_ms`
    TimeoutHit,

    /// A listener panicked; the panic was contained.
    ///
    /// Sets: `event_id`, `event_name`, `listener`, `attempt`, `reason`
    HandlerPanicked,

    /// Next attempt scheduled after a failure.
    ///
    /// Sets: `event_id`, `event_name`, `listener`, `attempt` (the failed one),
    /// `delay_ms`, `reason`
    BackoffScheduled,

    // === Per-listener terminal reports ===
    /// Listener handled the event.
    ///
    /// Sets: `event_id`, `event_name`, `listener`, `attempt`
    ListenerSucceeded,

    /// Listener exhausted its attempts (or failed fatally).
    ///
    /// Sets: `event_id`, `event_name`, `listener`, `attempt`, `reason`
    ListenerExhausted,

    /// Listener was unregistered before the next attempt; delivery abandoned.
    ///
    /// Sets: `event_id`, `event_name`, `listener`, `attempt`
    ListenerRemoved,

    // === Per-event terminal reports ===
    /// Every matching listener succeeded.
    ///
    /// Sets: `event_id`, `event_name`
    EventDelivered,

    /// At least one listener failed terminally.
    ///
    /// Sets: `event_id`, `event_name`, `reason` (failed/total)
    EventFailed,

    /// No listener matched the event.
    ///
    /// Sets: `event_id`, `event_name`
    EventUnrouted,

    /// Event was evicted from the queue to make room for a higher priority one.
    ///
    /// Sets: `event_id`, `event_name`, `reason`
    EventDropped,
}

/// Dispatch report with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`ReportKind`]
#[derive(Debug, Clone)]
pub struct Report {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Report classification.
    pub kind: ReportKind,

    /// Id of the event concerned.
    pub event_id: Option<u64>,
    /// Name of the event concerned.
    pub event_name: Option<Arc<str>>,
    /// Listener name, for per-listener reports.
    pub listener: Option<Arc<str>>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay before the next attempt (ms).
    pub delay_ms: Option<u32>,
    /// Handler timeout that was hit (ms).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
}

impl Report {
    /// Creates a new report of the given kind with current timestamp and next sequence number.
    pub fn new(kind: ReportKind) -> Self {
        Self {
            seq: REPORT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            event_id: None,
            event_name: None,
            listener: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_event(mut self, id: u64, name: impl Into<Arc<str>>) -> Self {
        self.event_id = Some(id);
        self.event_name = Some(name.into());
        self
    }

    #[inline]
    pub fn with_listener(mut self, listener: impl Into<Arc<str>>) -> Self {
        self.listener = Some(listener.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True for reports that close out a whole event.
    pub fn is_event_terminal(&self) -> bool {
        matches!(
            self.kind,
            ReportKind::EventDelivered
                | ReportKind::EventFailed
                | ReportKind::EventUnrouted
                | ReportKind::EventDropped
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
