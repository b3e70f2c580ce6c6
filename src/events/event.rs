//! # Event records and priorities.
//!
//! An [`Event`] is one immutable occurrence: a dot-namespaced name, an opaque
//! JSON payload, a [`Priority`], the time it was queued and an optional source.
//! Once queued it is shared as `Arc<Event>`; retries hand the *same* instance
//! to the listener again.
//!
//! ## Ordering guarantees
//! Each event carries a process-unique `id` that increases monotonically with
//! emission order. Within one priority class the dispatcher delivers in `id` order.
//!
//! ## Example
//! ```rust
//! use eventvisor::{EmitRequest, Priority};
//! use serde_json::json;
//!
//! let req = EmitRequest::new("form.submit", json!({ "form": "signup" }))
//!     .with_priority(Priority::High)
//!     .with_source("signup-page");
//!
//! assert_eq!(req.priority(), Priority::High);
//! assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
//! assert!("urgent".parse::<Priority>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EmitError;

/// Global id counter for events.
static EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Delivery class of an event. Higher classes always drain first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    /// All priorities, highest first (drain order).
    pub const DRAIN_ORDER: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Bucket index; `0` is drained first.
    #[inline]
    pub(crate) fn bucket(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = EmitError;

    /// Parses a priority name (case-insensitive). Unknown values are rejected,
    /// never downgraded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            _ => Err(EmitError::InvalidPriority {
                value: s.to_string(),
            }),
        }
    }
}

/// Immutable event as seen by listeners.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Process-unique, monotonically increasing id.
    pub id: u64,
    /// Dot-namespaced name, e.g. `form.submit`.
    pub name: Arc<str>,
    /// Opaque payload.
    pub payload: Value,
    /// Delivery class.
    pub priority: Priority,
    /// Wall-clock time the event was queued.
    pub timestamp: SystemTime,
    /// Originating component, for diagnostics.
    pub source: Option<Arc<str>>,
}

impl Event {
    /// Milliseconds since the Unix epoch of [`Event::timestamp`].
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0)
    }
}

/// Producer-side description of an event before it is stamped and queued.
#[derive(Debug, Clone)]
pub struct EmitRequest {
    name: String,
    payload: Value,
    priority: Priority,
    source: Option<Arc<str>>,
}

impl EmitRequest {
    /// New request at [`Priority::Normal`].
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            priority: Priority::Normal,
            source: None,
        }
    }

    #[inline]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Validates the request and stamps it into an [`Event`].
    pub(crate) fn into_event(self) -> Result<Event, EmitError> {
        validate_name(&self.name)?;
        Ok(Event {
            id: EVENT_ID.fetch_add(1, AtomicOrdering::Relaxed),
            name: Arc::from(self.name),
            payload: self.payload,
            priority: self.priority,
            timestamp: SystemTime::now(),
            source: self.source,
        })
    }
}

/// Checks that `name` is one or more non-empty segments of `[A-Za-z0-9_-]`
/// separated by dots.
pub(crate) fn validate_name(name: &str) -> Result<(), EmitError> {
    let invalid = |reason| EmitError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    for segment in name.split('.') {
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("segments may only contain [A-Za-z0-9_-]"));
        }
    }
    Ok(())
}
