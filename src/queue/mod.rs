//! # Event queue shared by producers and the drain loop.
//!
//! [`PriorityQueue`] is the plain data structure; `EventQueue` wraps it with a
//! short-lived lock, a closed flag and a [`Notify`] that wakes the drain loop
//! on every push. A second [`Notify`] fires for critical pushes only, so the
//! drain loop can take critical events while it waits for an in-flight slot.
//!
//! ```text
//! emit() ──► EventQueue::push ──► [C][H][N][L] ──► notify_one
//!                                                     │
//! drain loop ◄── EventQueue::next (awaits Notify) ◄───┘
//!            ◄── EventQueue::pop_critical / critical_ready
//! ```
//!
//! ## Rules
//! - Producers never wait: `push` takes the lock, appends, releases.
//! - `Notify` keeps one permit, so a push racing with the loop going idle is not lost.
//! - After `close` every push fails with `EmitError::Closed`.

mod priority_queue;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};

use crate::core::DeliveryReport;
use crate::error::{DeliveryError, EmitError};
use crate::events::{Event, Priority};

pub use priority_queue::{OverflowPolicy, PriorityQueue};

/// Completion channel of an `emit_critical` caller.
pub(crate) type Waiter = oneshot::Sender<Result<DeliveryReport, DeliveryError>>;

/// One queued event plus its optional waiter.
pub(crate) struct Queued {
    pub(crate) event: Arc<Event>,
    pub(crate) waiter: Option<Waiter>,
}

struct State {
    queue: PriorityQueue<Queued>,
    closed: bool,
}

pub(crate) struct EventQueue {
    state: Mutex<State>,
    notify: Notify,
    critical: Notify,
}

impl EventQueue {
    pub(crate) fn new(capacity: Option<usize>, overflow: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(State {
                queue: PriorityQueue::new(capacity, overflow),
                closed: false,
            }),
            notify: Notify::new(),
            critical: Notify::new(),
        }
    }

    /// Queues `item`; returns the entry evicted to make room, if any.
    pub(crate) fn push(&self, item: Queued) -> Result<Option<Queued>, EmitError> {
        let priority = item.event.priority;
        let evicted = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(EmitError::Closed);
            }
            state.queue.enqueue(priority, item)?
        };
        self.notify.notify_one();
        if priority == Priority::Critical {
            self.critical.notify_one();
        }
        Ok(evicted.map(|(_, queued)| queued))
    }

    /// Waits for the next entry; `None` once the queue is closed.
    pub(crate) async fn next(&self) -> Option<Queued> {
        loop {
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some((_, queued)) = state.queue.dequeue() {
                    return Some(queued);
                }
            }
            self.notify.notified().await;
        }
    }

    /// Takes the oldest critical entry, if one is queued.
    pub(crate) fn pop_critical(&self) -> Option<Queued> {
        let mut state = self.state.lock();
        if state.closed || state.queue.len_of(Priority::Critical) == 0 {
            return None;
        }
        state.queue.dequeue().map(|(_, queued)| queued)
    }

    /// Resolves once a critical entry is queued. Never resolves on a closed queue.
    pub(crate) async fn critical_ready(&self) {
        loop {
            {
                let state = self.state.lock();
                if !state.closed && state.queue.len_of(Priority::Critical) > 0 {
                    return;
                }
            }
            self.critical.notified().await;
        }
    }

    /// Marks the queue closed and hands back everything still pending.
    pub(crate) fn close(&self) -> Vec<Queued> {
        let pending = {
            let mut state = self.state.lock();
            state.closed = true;
            state.queue.drain()
        };
        self.notify.notify_waiters();
        pending.into_iter().map(|(_, queued)| queued).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
