//! # Per-listener start order.
//!
//! Every event resolved for a listener takes a [`Turn`] from that listener's
//! [`Sequencer`], in dequeue order. The first attempt of the event waits for
//! its turn and gives it up right after the handler's first poll, so one
//! listener observes same-priority events in emission order even when
//! deliveries run on several worker threads.
//!
//! ```text
//! drain loop:  issue() → #0, #1, #2          (dequeue order)
//! delivery #1: wait() … until #0 released
//! delivery #0: first poll of handle() → release #0 → #1 may start
//! ```
//!
//! Retries are not ordered. A turn dropped without starting (listener
//! removed, delivery aborted) is released as well, so later turns never stall.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

#[derive(Debug, Default)]
struct Progress {
    /// Lowest turn not yet released.
    next: u64,
    /// Turns released ahead of `next`.
    released: BTreeSet<u64>,
}

/// Turn dispenser shared by all registrations of one handler.
#[derive(Debug)]
pub(crate) struct Sequencer {
    issued: AtomicU64,
    progress: watch::Sender<Progress>,
}

impl Sequencer {
    pub(crate) fn new() -> Self {
        let (progress, _rx) = watch::channel(Progress::default());
        Self {
            issued: AtomicU64::new(0),
            progress,
        }
    }

    /// Takes the next turn. Only the drain loop calls this.
    pub(crate) fn issue(self: &Arc<Self>) -> Turn {
        Turn {
            seq: Arc::clone(self),
            n: self.issued.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn release(&self, n: u64) {
        self.progress.send_if_modified(|p| {
            if n < p.next {
                return false;
            }
            p.released.insert(n);
            let mut moved = false;
            while p.released.remove(&p.next) {
                p.next += 1;
                moved = true;
            }
            moved
        });
    }
}

/// One listener's slot in the start order; released on drop.
#[derive(Debug)]
pub(crate) struct Turn {
    seq: Arc<Sequencer>,
    n: u64,
}

impl Turn {
    /// Waits until every earlier turn has been released.
    pub(crate) async fn wait(&self) {
        let n = self.n;
        let mut rx = self.seq.progress.subscribe();
        let _ = rx.wait_for(|p| p.next >= n).await;
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        self.seq.release(self.n);
    }
}
