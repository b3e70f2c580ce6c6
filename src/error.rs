//! Error types used by the dispatcher, listeners and the analytics bridge.
//!
//! - [`EmitError`] rejects an event (or a registration) synchronously; nothing is queued.
//! - [`HandlerError`] is returned by a single listener attempt.
//! - [`DeliveryError`] is what an `emit_critical` caller sees when delivery did not succeed.
//! - [`SinkError`] comes back from an [`AnalyticsSink`](crate::AnalyticsSink).
//!
//! Like the rest of the crate, each enum exposes `as_label` for logs.

use std::time::Duration;

use thiserror::Error;

use crate::core::DeliveryReport;

/// # Validation and admission errors raised at emit/registration time.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// Priority string was not one of `critical`, `high`, `normal`, `low`.
    #[error("invalid priority {value:?}")]
    InvalidPriority {
        /// The rejected input.
        value: String,
    },

    /// Event name is empty or has an empty / malformed segment.
    #[error("invalid event name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Listener pattern is malformed (e.g. `*` in a non-final segment).
    #[error("invalid listener pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    /// Queue is at capacity and nothing of lower priority could be evicted.
    #[error("queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Dispatcher has been shut down.
    #[error("dispatcher closed")]
    Closed,
}

impl EmitError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use eventvisor::EmitError;
    ///
    /// let err = EmitError::QueueFull { capacity: 8 };
    /// assert_eq!(err.as_label(), "emit_queue_full");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EmitError::InvalidPriority { .. } => "emit_invalid_priority",
            EmitError::InvalidName { .. } => "emit_invalid_name",
            EmitError::InvalidPattern { .. } => "emit_invalid_pattern",
            EmitError::QueueFull { .. } => "emit_queue_full",
            EmitError::Closed => "emit_closed",
        }
    }

    /// True for errors caused by malformed input rather than dispatcher state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EmitError::InvalidPriority { .. }
                | EmitError::InvalidName { .. }
                | EmitError::InvalidPattern { .. }
        )
    }
}

/// # Outcome of a failed listener attempt.
///
/// `Fail`, `Timeout` and `Panicked` are retried according to the
/// [`RetryPolicy`](crate::RetryPolicy); `Fatal` ends the delivery immediately.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Attempt did not finish within the configured handler timeout.
    #[error("timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Attempt failed; a later attempt may succeed.
    #[error("handler failed: {reason}")]
    Fail { reason: String },

    /// Attempt failed and must not be retried.
    #[error("fatal handler error (no retry): {reason}")]
    Fatal { reason: String },

    /// Handler panicked; the panic was contained.
    #[error("handler panicked: {info}")]
    Panicked { info: String },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(reason: impl Into<String>) -> Self {
        HandlerError::Fail {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`HandlerError::Fatal`].
    pub fn fatal(reason: impl Into<String>) -> Self {
        HandlerError::Fatal {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Timeout { .. } => "handler_timeout",
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Fatal { .. } => "handler_fatal",
            HandlerError::Panicked { .. } => "handler_panicked",
        }
    }

    /// Indicates whether another attempt may be made.
    ///
    /// # Example
    /// ```
    /// use eventvisor::HandlerError;
    ///
    /// assert!(HandlerError::fail("503").is_retryable());
    /// assert!(!HandlerError::fatal("bad payload").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        !matches!(self, HandlerError::Fatal { .. })
    }
}

/// # Failure surfaced to an `emit_critical` caller.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    /// At least one matching listener ended in a terminal failure.
    #[error("delivery of {name:?} failed for {failed} listener(s)", name = .0.event.name, failed = .0.failed_count())]
    Failed(DeliveryReport),

    /// Dispatcher shut down before the event was delivered.
    #[error("dispatcher closed before delivery")]
    Closed,

    /// The event was rejected before it reached the queue.
    #[error(transparent)]
    Rejected(#[from] EmitError),
}

impl DeliveryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::Failed(_) => "delivery_failed",
            DeliveryError::Closed => "delivery_closed",
            DeliveryError::Rejected(e) => e.as_label(),
        }
    }

    /// Returns the report when listeners actually ran.
    pub fn report(&self) -> Option<&DeliveryReport> {
        match self {
            DeliveryError::Failed(report) => Some(report),
            _ => None,
        }
    }
}

/// # Errors produced by the dispatcher runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// In-flight deliveries did not finish within the shutdown grace period and were aborted.
    #[error("shutdown grace {grace:?} exceeded; aborted {aborted} in-flight deliveries")]
    GraceExceeded { grace: Duration, aborted: usize },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Error returned by an analytics sink.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Sink is temporarily unable to accept the event.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// Sink rejected the event permanently (schema, auth, ...).
    #[error("sink rejected event: {0}")]
    Rejected(String),
}

impl From<SinkError> for HandlerError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Unavailable(_) => HandlerError::fail(err.to_string()),
            SinkError::Rejected(_) => HandlerError::fatal(err.to_string()),
        }
    }
}
