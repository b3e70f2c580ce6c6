//! # Listener abstraction and function-backed listener.
//!
//! A [`Listener`] has a stable [`name`](Listener::name) and an async
//! [`handle`](Listener::handle) method. The dispatcher calls `handle` once per
//! attempt, inside its own task, so a listener never runs on the producer's
//! call stack. [`ListenerRef`] (`Arc<dyn Listener>`) is the handle the registry
//! stores; its pointer identity is what makes registration idempotent.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{Event, HandlerError, ListenerFn, ListenerRef};
//!
//! let audit: ListenerRef = ListenerFn::arc("audit", |ev: Arc<Event>| async move {
//!     if ev.payload.is_null() {
//!         return Err(HandlerError::fatal("empty payload"));
//!     }
//!     Ok(())
//! });
//! assert_eq!(audit.name(), "audit");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::events::Event;

/// Shared handle to a listener.
pub type ListenerRef = Arc<dyn Listener>;

/// Asynchronous event handler.
///
/// ### Implementation requirements
/// - Return `Err(HandlerError::Fail { .. })` for failures worth retrying and
///   `Err(HandlerError::Fatal { .. })` for failures that never will succeed.
/// - Do not rely on being cancelled: a timed-out attempt keeps running in the
///   background and its result is discarded.
/// - Panics are contained and count as a failed attempt.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Stable, human-readable name used in reports and logs.
    fn name(&self) -> &str;

    /// Handles one delivery attempt of `event`.
    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError>;
}

/// Function-backed listener.
///
/// Wraps a closure that creates a fresh future per attempt; shared state must
/// be captured explicitly (e.g. an `Arc<...>`).
pub struct ListenerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ListenerFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the listener and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Listener for ListenerFn<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError> {
        (self.f)(event).await
    }
}

impl<F> std::fmt::Debug for ListenerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerFn").field("name", &self.name).finish()
    }
}
