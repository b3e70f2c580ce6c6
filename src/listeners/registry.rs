//! # Listener registry.
//!
//! Stores registrations in a trie keyed by dot-separated segments so that
//! resolving the listeners of an event walks the name once instead of
//! scanning every pattern.
//!
//! ## Architecture
//! ```text
//! on("form.*", crm)        on("form.submit", audit)      on("*", tap)
//!
//! root ── wildcard: [tap]
//!  └─ "form" ── wildcard: [crm]
//!       └─ "submit" ── exact: [audit]
//!
//! resolve("form.submit") → root.wildcard + form.wildcard + form/submit.exact
//!                        → [crm, audit, tap] sorted by registration id
//! ```
//!
//! ## Rules
//! - `(pattern, handler)` is the identity of a registration; registering it
//!   again returns the existing [`ListenerId`].
//! - The same handler reached through several patterns is resolved once per
//!   event, as one [`Route`] that stays active while any of its matching
//!   registrations is.
//! - Unregistering clears the registration's active flag under the write lock
//!   and then waits on the start gate, so once it returns no attempt of that
//!   registration can start. Attempts check the flag under the same gate.
//! - The gate is reentrant: a handler may unregister itself from its own
//!   first poll.
//! - All registrations of one handler share a [`Sequencer`], which orders
//!   the handler's first attempts by dequeue order.
//! - Locks are held only for the trie operation itself, never across an
//!   await. The gate is never taken while the trie lock is held.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, RwLock};

use crate::error::EmitError;
use crate::listeners::turn::{Sequencer, Turn};
use crate::listeners::{ListenerRef, Pattern};

/// Opaque id of one registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// One `(pattern, handler)` registration.
pub(crate) struct Registration {
    pub(crate) id: ListenerId,
    pub(crate) pattern: Pattern,
    pub(crate) listener: ListenerRef,
    active: AtomicBool,
    order: Arc<Sequencer>,
}

impl Registration {
    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn same_handler(&self, other: &ListenerRef) -> bool {
        same_listener(&self.listener, other)
    }
}

fn same_listener(a: &ListenerRef, b: &ListenerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

type Gate = Arc<ReentrantMutex<()>>;

/// One handler's registrations matching an event, lowest id first.
///
/// Never empty. Identity fields (id, pattern) come from the lowest-id
/// registration; the route is active while any registration is.
#[derive(Clone)]
pub(crate) struct Route {
    regs: Vec<Arc<Registration>>,
    gate: Gate,
}

impl Route {
    fn primary(&self) -> &Registration {
        &self.regs[0]
    }

    pub(crate) fn id(&self) -> ListenerId {
        self.primary().id
    }

    pub(crate) fn pattern(&self) -> &Pattern {
        &self.primary().pattern
    }

    pub(crate) fn listener(&self) -> &ListenerRef {
        &self.primary().listener
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        self.primary().listener.name()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.regs.iter().any(|r| r.is_active())
    }

    /// Runs `f` with the current active state while unregistering is held off.
    pub(crate) fn gated<R>(&self, f: impl FnOnce(bool) -> R) -> R {
        let _gate = self.gate.lock();
        f(self.is_active())
    }

    /// Takes the handler's next start turn.
    pub(crate) fn turn(&self) -> Turn {
        self.primary().order.issue()
    }
}

#[derive(Default)]
struct Node {
    children: HashMap<Box<str>, Node>,
    exact: Vec<Arc<Registration>>,
    wildcard: Vec<Arc<Registration>>,
}

impl Node {
    fn descend_mut(&mut self, prefix: &[Box<str>]) -> &mut Node {
        prefix.iter().fold(self, |node, segment| {
            node.children.entry(segment.clone()).or_default()
        })
    }

    fn descend(&self, prefix: &[Box<str>]) -> Option<&Node> {
        prefix
            .iter()
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    fn slot_mut(&mut self, pattern: &Pattern) -> &mut Vec<Arc<Registration>> {
        let node = self.descend_mut(pattern.prefix());
        if pattern.is_wildcard() {
            &mut node.wildcard
        } else {
            &mut node.exact
        }
    }

    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.exact.is_empty() && self.wildcard.is_empty()
    }

    /// Removes empty nodes along `prefix`.
    fn prune(&mut self, prefix: &[Box<str>]) {
        let Some((head, rest)) = prefix.split_first() else {
            return;
        };
        if let Some(child) = self.children.get_mut(head) {
            child.prune(rest);
            if child.is_empty() {
                self.children.remove(head);
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    root: Node,
    by_id: HashMap<ListenerId, Arc<Registration>>,
}

impl Inner {
    fn detach(&mut self, reg: &Arc<Registration>) {
        reg.active.store(false, Ordering::Release);
        self.by_id.remove(&reg.id);
        self.root
            .slot_mut(&reg.pattern)
            .retain(|r| r.id != reg.id);
        self.root.prune(reg.pattern.prefix());
    }

    fn order_of(&self, listener: &ListenerRef) -> Option<Arc<Sequencer>> {
        self.by_id
            .values()
            .find(|r| r.same_handler(listener))
            .map(|r| Arc::clone(&r.order))
    }
}

/// Process-wide set of listener registrations.
#[derive(Default)]
pub(crate) struct Registry {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
    gate: Gate,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` on `pattern`; idempotent for the same pair.
    pub(crate) fn register(
        &self,
        pattern: &str,
        listener: ListenerRef,
    ) -> Result<ListenerId, EmitError> {
        let pattern = Pattern::parse(pattern)?;
        let mut inner = self.inner.write();

        if let Some(existing) = inner
            .root
            .slot_mut(&pattern)
            .iter()
            .find(|r| r.same_handler(&listener))
        {
            return Ok(existing.id);
        }

        let order = inner
            .order_of(&listener)
            .unwrap_or_else(|| Arc::new(Sequencer::new()));
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let reg = Arc::new(Registration {
            id,
            pattern,
            listener,
            active: AtomicBool::new(true),
            order,
        });
        inner.root.slot_mut(&reg.pattern).push(Arc::clone(&reg));
        inner.by_id.insert(id, reg);
        Ok(id)
    }

    /// Removes the `(pattern, listener)` registration. Returns `false` when absent.
    pub(crate) fn unregister(&self, pattern: &str, listener: &ListenerRef) -> bool {
        let Ok(pattern) = Pattern::parse(pattern) else {
            return false;
        };
        let mut inner = self.inner.write();
        let found = inner
            .root
            .descend(pattern.prefix())
            .and_then(|node| {
                let slot = if pattern.is_wildcard() {
                    &node.wildcard
                } else {
                    &node.exact
                };
                slot.iter().find(|r| r.same_handler(listener)).cloned()
            });
        match found {
            Some(reg) => {
                inner.detach(&reg);
                drop(inner);
                self.settle();
                true
            }
            None => false,
        }
    }

    /// Removes a registration by id. Returns `false` when absent.
    pub(crate) fn unregister_id(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.write();
        match inner.by_id.get(&id).cloned() {
            Some(reg) => {
                inner.detach(&reg);
                drop(inner);
                self.settle();
                true
            }
            None => false,
        }
    }

    /// Waits out any attempt that is between its active check and its first poll.
    fn settle(&self) {
        drop(self.gate.lock());
    }

    /// Snapshot of the routes matching `name`, one per distinct handler,
    /// ordered by each handler's lowest registration id.
    pub(crate) fn resolve(&self, name: &str) -> Vec<Route> {
        let inner = self.inner.read();
        let mut matched: Vec<Arc<Registration>> = Vec::new();

        let mut node = Some(&inner.root);
        for segment in name.split('.') {
            let Some(current) = node else {
                break;
            };
            matched.extend(current.wildcard.iter().cloned());
            node = current.children.get(segment);
        }
        if let Some(last) = node {
            matched.extend(last.exact.iter().cloned());
        }

        matched.sort_by_key(|r| r.id);
        let mut routes: Vec<Route> = Vec::with_capacity(matched.len());
        for reg in matched {
            match routes
                .iter_mut()
                .find(|route| same_listener(route.listener(), &reg.listener))
            {
                Some(route) => route.regs.push(reg),
                None => routes.push(Route {
                    regs: vec![reg],
                    gate: Arc::clone(&self.gate),
                }),
            }
        }
        routes
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }
}
