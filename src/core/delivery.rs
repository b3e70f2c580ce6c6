//! # Delivery of one event to one listener.
//!
//! Runs the attempt loop for a single `(event, listener)` pair:
//! - waits for the listener's start turn before the first attempt,
//! - stops as soon as the listener is unregistered,
//! - bounds every attempt by the handler timeout,
//! - retries per [`RetryPolicy`] with backoff between attempts,
//! - gives up early when the dispatcher aborts (shutdown grace exceeded).
//!
//! ## Flow
//! ```text
//! turn.wait()
//! loop {
//!   ├─► route inactive?             → ListenerRemoved, Removed
//!   ├─► attempt += 1, AttemptStarting
//!   ├─► run_attempt()               (first attempt releases the turn)
//!   │     ├─ Removed → ListenerRemoved, Removed
//!   │     ├─ Handled → ListenerSucceeded, Succeeded
//!   │     └─ Err → retry.next_delay(attempt, &err)
//!   │               ├─ None        → ListenerExhausted, Failed(err)
//!   │               └─ Some(delay) → BackoffScheduled, sleep(delay) (abortable)
//! }
//! ```
//!
//! ## Rules
//! - Attempts for one pair run sequentially, never in parallel.
//! - Every attempt receives the same `Arc<Event>`.
//! - First attempts of one listener start in dequeue order; retries are unordered.

use std::sync::Arc;
use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::core::report::{ListenerOutcome, ListenerStatus};
use crate::core::runner::{AttemptEnd, attempt_report, run_attempt};
use crate::events::{Event, ReportBus, ReportKind};
use crate::listeners::{Route, Turn};
use crate::policies::RetryPolicy;

/// Policies and handles shared by every delivery of a dispatcher.
#[derive(Clone)]
pub(crate) struct DeliveryContext {
    pub(crate) retry: RetryPolicy,
    pub(crate) timeout: Option<Duration>,
    pub(crate) bus: ReportBus,
    /// Cancelled when in-flight deliveries must stop retrying.
    pub(crate) abort: CancellationToken,
}

/// Delivers `event` to the listener of `route` until a terminal state.
pub(crate) async fn deliver(
    route: Route,
    turn: Turn,
    event: Arc<Event>,
    ctx: &DeliveryContext,
) -> ListenerOutcome {
    let listener = route.listener();
    let mut attempt: u32 = 0;

    turn.wait().await;
    let mut turn = Some(turn);

    let status = loop {
        if !route.is_active() {
            ctx.bus
                .publish(attempt_report(ReportKind::ListenerRemoved, listener, &event, attempt));
            break ListenerStatus::Removed;
        }

        attempt += 1;
        ctx.bus
            .publish(attempt_report(ReportKind::AttemptStarting, listener, &event, attempt));

        let ran = run_attempt(&route, &event, ctx.timeout, attempt, &ctx.bus, turn.take()).await;
        let err = match ran {
            Ok(AttemptEnd::Removed) => {
                ctx.bus.publish(attempt_report(
                    ReportKind::ListenerRemoved,
                    listener,
                    &event,
                    attempt,
                ));
                break ListenerStatus::Removed;
            }
            Ok(AttemptEnd::Handled) => {
                ctx.bus.publish(attempt_report(
                    ReportKind::ListenerSucceeded,
                    listener,
                    &event,
                    attempt,
                ));
                break ListenerStatus::Succeeded;
            }
            Err(err) => err,
        };

        let Some(delay) = ctx.retry.next_delay(attempt, &err) else {
            tracing::warn!(
                listener = route.name(),
                pattern = %route.pattern(),
                event = %event.name,
                event_id = event.id,
                attempts = attempt,
                error = %err,
                "listener gave up on event"
            );
            ctx.bus.publish(
                attempt_report(ReportKind::ListenerExhausted, listener, &event, attempt)
                    .with_reason(err.to_string()),
            );
            break ListenerStatus::Failed(err);
        };

        tracing::debug!(
            listener = route.name(),
            event = %event.name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying listener after backoff"
        );
        ctx.bus.publish(
            attempt_report(ReportKind::BackoffScheduled, listener, &event, attempt)
                .with_delay(delay)
                .with_reason(err.to_string()),
        );

        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        select! {
            _ = &mut sleep => {}
            _ = ctx.abort.cancelled() => {
                ctx.bus.publish(
                    attempt_report(ReportKind::ListenerExhausted, listener, &event, attempt)
                        .with_reason("dispatcher shutting down"),
                );
                break ListenerStatus::Failed(err);
            }
        }
    };

    ListenerOutcome {
        id: route.id(),
        listener: Arc::from(route.name()),
        attempts: attempt,
        status,
    }
}
