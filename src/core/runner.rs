//! # Run a single listener attempt.
//!
//! Executes one attempt of a [`Listener`](crate::Listener) for one event with an optional
//! timeout and publishes the attempt-level reports.
//!
//! ## Flow
//! ```text
//! spawn(listener.handle(event))  (own task, panics caught)
//!     │
//!     ├─ first poll, under the route gate:
//!     │     route inactive  → Removed (handler never polled)
//!     │     afterwards the start turn, if any, is released
//!     ├─ Ok(())             → Handled
//!     ├─ Err(e)             → AttemptFailed, Err(e)
//!     ├─ panic              → HandlerPanicked + AttemptFailed, Err(Panicked)
//!     └─ timeout elapsed    → TimeoutHit + AttemptFailed, Err(Timeout)
//!                             (task keeps running detached; result discarded)
//! ```
//!
//! ## Rules
//! - The attempt runs in its own task, so a slow or blocked handler never
//!   holds up the drain loop or sibling listeners.
//! - Timing out does **not** cancel the handler. It only stops waiting for it.
//! - The active check and the first poll happen under one gate hold, so an
//!   unregister that returned before the check is always observed.

use std::any::Any;
use std::future::{Future, poll_fn};
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;

use crate::error::HandlerError;
use crate::events::{Event, Report, ReportBus, ReportKind};
use crate::listeners::{ListenerRef, Route, Turn};

/// How an attempt that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptEnd {
    /// The handler ran to completion.
    Handled,
    /// The route was unregistered before the handler started.
    Removed,
}

/// Executes attempt number `attempt` of `route` for `event`.
///
/// `turn` is released right after the handler's first poll.
pub(crate) async fn run_attempt(
    route: &Route,
    event: &Arc<Event>,
    timeout: Option<Duration>,
    attempt: u32,
    bus: &ReportBus,
    turn: Option<Turn>,
) -> Result<AttemptEnd, HandlerError> {
    let listener = route.listener();
    let task = {
        let route = route.clone();
        let event = Arc::clone(event);
        tokio::spawn(async move {
            let mut turn = turn;
            let listener = Arc::clone(route.listener());
            let mut handling = pin!(AssertUnwindSafe(listener.handle(event)).catch_unwind());
            let mut started = false;
            let polled = poll_fn(|cx| {
                if started {
                    return handling.as_mut().poll(cx).map(Some);
                }
                started = true;
                let first = route.gated(|active| active.then(|| handling.as_mut().poll(cx)));
                drop(turn.take());
                match first {
                    Some(poll) => poll.map(Some),
                    None => Poll::Ready(None),
                }
            })
            .await;
            match polled {
                None => Ok(AttemptEnd::Removed),
                Some(Ok(res)) => res.map(|()| AttemptEnd::Handled),
                Some(Err(panic)) => Err(HandlerError::Panicked {
                    info: panic_message(&*panic),
                }),
            }
        })
    };

    let joined = match timeout {
        Some(dur) => match time::timeout(dur, task).await {
            Ok(joined) => joined,
            Err(_elapsed) => {
                bus.publish(
                    attempt_report(ReportKind::TimeoutHit, listener, event, attempt)
                        .with_timeout(dur),
                );
                let err = HandlerError::Timeout { timeout: dur };
                publish_failed(bus, listener, event, attempt, &err);
                return Err(err);
            }
        },
        None => task.await,
    };

    let res = joined.unwrap_or_else(|join_err| Err(HandlerError::fail(join_err.to_string())));

    if let Err(err) = &res {
        if let HandlerError::Panicked { info } = err {
            tracing::error!(
                listener = listener.name(),
                event = %event.name,
                event_id = event.id,
                attempt,
                panic = %info,
                "listener panicked"
            );
            bus.publish(
                attempt_report(ReportKind::HandlerPanicked, listener, event, attempt)
                    .with_reason(info.as_str()),
            );
        }
        publish_failed(bus, listener, event, attempt, err);
    }
    res
}

pub(crate) fn attempt_report(
    kind: ReportKind,
    listener: &ListenerRef,
    event: &Event,
    attempt: u32,
) -> Report {
    Report::new(kind)
        .with_event(event.id, Arc::clone(&event.name))
        .with_listener(listener.name())
        .with_attempt(attempt)
}

fn publish_failed(
    bus: &ReportBus,
    listener: &ListenerRef,
    event: &Event,
    attempt: u32,
    err: &HandlerError,
) {
    bus.publish(
        attempt_report(ReportKind::AttemptFailed, listener, event, attempt)
            .with_reason(err.to_string()),
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
