//! # Dispatcher: owns the queue, the registry and the drain loop.
//!
//! The [`Dispatcher`] is the producer-facing handle. It validates and queues
//! events, keeps the listener registry, and runs one drain loop that turns
//! queued events into deliveries.
//!
//! ## High-level architecture
//! ```text
//! Producers:
//!   emit / emit_with / emit_request ──► validate ──► EventQueue::push ──► (returns id)
//!   emit_critical ──────────────────► validate ──► EventQueue::push(waiter) ──► await waiter
//!
//! Drain loop (one task):
//!   loop {
//!     EventQueue::pop_critical()    critical events skip the in-flight limit
//!     acquire in-flight slot (semaphore, optional; a critical push wakes it)
//!     EventQueue::next()            highest priority, oldest first
//!     Registry::resolve(name)       one route per matching handler
//!     route.turn()                  per-handler start order
//!     spawn deliver_event ─────────► join_all(deliver(route_i, event)) ──► DeliveryReport
//!   }                                                                    ├─► Report bus
//!                                                                        ├─► counters
//!                                                                        └─► waiter (critical only)
//!
//! Shutdown path:
//!   stop.cancel()          → drain loop exits, no further dequeues
//!   queue.close()          → pending critical waiters get DeliveryError::Closed
//!   wait ≤ shutdown_grace  → in-flight deliveries finish
//!   abort.cancel()         → otherwise: backoff sleeps end, remaining tasks aborted
//! ```
//!
//! ## Rules
//! - Listeners are resolved when an event is dequeued: a listener registered
//!   later never sees it, one unregistered later gets no further attempts.
//! - Deliveries of one event run concurrently. For each listener, first
//!   attempts start in dequeue order on any runtime flavor.
//! - Critical events never wait for an in-flight slot and do not take one.
//! - Handler outcomes never stop the drain loop.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{Dispatcher, DispatcherConfig, Event, HandlerError, ListenerFn, ListenerRef, Priority};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::builder(DispatcherConfig::default()).build()?;
//!
//!     let audit: ListenerRef = ListenerFn::arc("audit", |ev: Arc<Event>| async move {
//!         println!("{} {}", ev.name, ev.payload);
//!         Ok::<(), HandlerError>(())
//!     });
//!     dispatcher.on("order.*", audit)?;
//!
//!     dispatcher.emit_with("order.viewed", json!({ "id": 7 }), Priority::Low)?;
//!     let report = dispatcher.emit_critical("order.created", json!({ "id": 7 })).await?;
//!     assert!(report.is_success());
//!
//!     dispatcher.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::bridge::{AnalyticsSink, Bridge};
use crate::core::builder::DispatcherBuilder;
use crate::core::config::DispatcherConfig;
use crate::core::delivery::{DeliveryContext, deliver};
use crate::core::report::{DeliveryReport, DeliveryStatus};
use crate::core::stats::{Counters, DispatchStats};
use crate::error::{DeliveryError, EmitError, RuntimeError};
use crate::events::{EmitRequest, Priority, Report, ReportBus, ReportKind};
use crate::listeners::{ListenerId, ListenerRef, Registry, Route, Turn};
use crate::queue::{EventQueue, Queued, Waiter};

/// State shared between the handle, the drain loop and delivery tasks.
struct Inner {
    cfg: DispatcherConfig,
    queue: EventQueue,
    registry: Registry,
    bus: ReportBus,
    counters: Counters,
    limiter: Option<Arc<Semaphore>>,
    ctx: DeliveryContext,
    /// Cancelled to stop dequeuing.
    stop: CancellationToken,
}

/// In-process priority event dispatcher.
///
/// Construct with [`Dispatcher::builder`] (inside a Tokio runtime) and share the
/// returned `Arc` with every producer. Each instance is fully independent.
pub struct Dispatcher {
    inner: Arc<Inner>,
    drain: Mutex<Option<JoinHandle<JoinSet<()>>>>,
}

impl Dispatcher {
    /// Starts building a dispatcher with the given configuration.
    pub fn builder(cfg: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(cfg)
    }

    /// Creates the shared state and spawns the drain loop.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime (as `tokio::spawn` does).
    pub(crate) fn start(cfg: DispatcherConfig) -> Arc<Self> {
        let bus = ReportBus::new(cfg.report_capacity_clamped());
        let ctx = DeliveryContext {
            retry: cfg.retry,
            timeout: cfg.handler_timeout(),
            bus: bus.clone(),
            abort: CancellationToken::new(),
        };
        let inner = Arc::new(Inner {
            queue: EventQueue::new(cfg.queue_limit(), cfg.overflow),
            registry: Registry::new(),
            counters: Counters::default(),
            limiter: cfg.in_flight_limit().map(|n| Arc::new(Semaphore::new(n))),
            stop: CancellationToken::new(),
            bus,
            ctx,
            cfg,
        });

        let drain = tokio::spawn(drain_loop(Arc::clone(&inner)));
        Arc::new(Self {
            inner,
            drain: Mutex::new(Some(drain)),
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.cfg
    }

    // ---- producers ----

    /// Fire-and-forget emit at [`Priority::Normal`]. Returns the event id.
    pub fn emit(&self, name: impl Into<String>, payload: Value) -> Result<u64, EmitError> {
        self.emit_request(EmitRequest::new(name, payload))
    }

    /// Fire-and-forget emit at an explicit priority.
    pub fn emit_with(
        &self,
        name: impl Into<String>,
        payload: Value,
        priority: Priority,
    ) -> Result<u64, EmitError> {
        self.emit_request(EmitRequest::new(name, payload).with_priority(priority))
    }

    /// Fire-and-forget emit with a textual priority; unknown values are rejected.
    pub fn emit_str_priority(
        &self,
        name: impl Into<String>,
        payload: Value,
        priority: &str,
    ) -> Result<u64, EmitError> {
        let priority: Priority = match priority.parse() {
            Ok(priority) => priority,
            Err(err) => {
                self.inner.counters.rejected();
                return Err(err);
            }
        };
        self.emit_with(name, payload, priority)
    }

    /// Fire-and-forget emit of a fully described request.
    pub fn emit_request(&self, req: EmitRequest) -> Result<u64, EmitError> {
        self.enqueue(req, None)
    }

    /// Emits at [`Priority::Critical`] and waits until every matching listener
    /// has succeeded or failed terminally.
    ///
    /// Resolves `Ok` when no listener failed, `Err(DeliveryError::Failed)` with
    /// the full report otherwise.
    pub async fn emit_critical(
        &self,
        name: impl Into<String>,
        payload: Value,
    ) -> Result<DeliveryReport, DeliveryError> {
        self.emit_critical_request(EmitRequest::new(name, payload))
            .await
    }

    /// Like [`emit_critical`](Self::emit_critical) for a request (its priority is forced to critical).
    pub async fn emit_critical_request(
        &self,
        req: EmitRequest,
    ) -> Result<DeliveryReport, DeliveryError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(req.with_priority(Priority::Critical), Some(tx))?;
        match rx.await {
            Ok(res) => res,
            Err(_dropped) => Err(DeliveryError::Closed),
        }
    }

    fn enqueue(&self, req: EmitRequest, waiter: Option<Waiter>) -> Result<u64, EmitError> {
        let inner = &self.inner;
        let event = match req.into_event() {
            Ok(event) => Arc::new(event),
            Err(err) => {
                inner.counters.rejected();
                return Err(err);
            }
        };
        let id = event.id;
        let priority = event.priority;

        match inner.queue.push(Queued { event, waiter }) {
            Ok(evicted) => {
                inner.counters.emitted();
                if let Some(dropped) = evicted {
                    inner.report_dropped(dropped, priority);
                }
                Ok(id)
            }
            Err(err) => {
                inner.counters.rejected();
                tracing::debug!(event_id = id, error = %err, "emit rejected");
                Err(err)
            }
        }
    }

    // ---- registry ----

    /// Registers `listener` for events matching `pattern` (exact, `prefix.*` or `*`).
    ///
    /// Registering the same `(pattern, listener)` pair again returns the existing id.
    pub fn on(&self, pattern: &str, listener: ListenerRef) -> Result<ListenerId, EmitError> {
        self.inner.registry.register(pattern, listener)
    }

    /// Unregisters `(pattern, listener)`. No attempt starts for it after this returns.
    pub fn off(&self, pattern: &str, listener: &ListenerRef) -> bool {
        self.inner.registry.unregister(pattern, listener)
    }

    /// Unregisters by id.
    pub fn off_id(&self, id: ListenerId) -> bool {
        self.inner.registry.unregister_id(id)
    }

    /// Registers `bridge` on every pattern of its configuration.
    pub fn attach_bridge<S: AnalyticsSink>(
        &self,
        bridge: Arc<Bridge<S>>,
    ) -> Result<Vec<ListenerId>, EmitError> {
        let listener: ListenerRef = bridge.clone();
        bridge
            .patterns()
            .iter()
            .map(|pattern| self.on(pattern, Arc::clone(&listener)))
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.registry.len()
    }

    // ---- observability ----

    /// Subscribes to dispatch reports published from now on.
    pub fn reports(&self) -> broadcast::Receiver<Report> {
        self.inner.bus.subscribe()
    }

    pub fn stats(&self) -> DispatchStats {
        self.inner.counters.snapshot()
    }

    /// Number of events waiting in the queue (not counting in-flight deliveries).
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.queue.is_closed()
    }

    // ---- lifecycle ----

    /// Stops dequeuing, fails pending critical waiters with
    /// [`DeliveryError::Closed`], and waits up to
    /// [`DispatcherConfig::shutdown_grace`] for in-flight deliveries.
    ///
    /// Events still queued are discarded. Calling `shutdown` twice is harmless.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let inner = &self.inner;
        let grace = self.config().shutdown_grace;
        inner.stop.cancel();

        let discarded = inner.queue.close();
        if !discarded.is_empty() {
            tracing::info!(discarded = discarded.len(), "discarding queued events on shutdown");
        }
        for queued in discarded {
            if let Some(waiter) = queued.waiter {
                let _ = waiter.send(Err(DeliveryError::Closed));
            }
        }

        let handle = self.drain.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };
        let Ok(mut deliveries) = handle.await else {
            return Ok(());
        };

        let finished = time::timeout(grace, async {
            while deliveries.join_next().await.is_some() {}
        })
        .await;

        match finished {
            Ok(()) => {
                tracing::debug!("dispatcher stopped within grace");
                Ok(())
            }
            Err(_elapsed) => {
                inner.ctx.abort.cancel();
                let aborted = deliveries.len();
                deliveries.shutdown().await;
                tracing::warn!(?grace, aborted, "shutdown grace exceeded");
                Err(RuntimeError::GraceExceeded { grace, aborted })
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.inner.stop.cancel();
    }
}

impl Inner {
    async fn deliver_event(&self, queued: Queued, routes: Vec<(Route, Turn)>) {
        let Queued { event, waiter } = queued;
        let outcomes = join_all(
            routes
                .into_iter()
                .map(|(route, turn)| deliver(route, turn, Arc::clone(&event), &self.ctx)),
        )
        .await;
        self.finish(DeliveryReport { event, outcomes }, waiter);
    }

    fn finish(&self, report: DeliveryReport, waiter: Option<Waiter>) {
        let status = report.status();
        self.counters.finished(status);

        let event = &report.event;
        let base = |kind| Report::new(kind).with_event(event.id, Arc::clone(&event.name));
        let published = match status {
            DeliveryStatus::Delivered => base(ReportKind::EventDelivered),
            DeliveryStatus::Unrouted => {
                tracing::trace!(event = %event.name, event_id = event.id, "no listener matched");
                base(ReportKind::EventUnrouted)
            }
            DeliveryStatus::Failed | DeliveryStatus::PartiallyFailed => {
                let failed = report.failed_count();
                let total = report.outcomes.len();
                tracing::warn!(
                    event = %event.name,
                    event_id = event.id,
                    priority = %event.priority,
                    failed,
                    total,
                    "event delivery failed"
                );
                base(ReportKind::EventFailed).with_reason(format!("{failed}/{total} listeners failed"))
            }
        };
        self.bus.publish(published);

        if let Some(waiter) = waiter {
            let res = if report.is_success() {
                Ok(report)
            } else {
                Err(DeliveryError::Failed(report))
            };
            let _ = waiter.send(res);
        }
    }

    fn report_dropped(&self, dropped: Queued, incoming: Priority) {
        self.counters.dropped();
        let event = &dropped.event;
        tracing::warn!(
            event = %event.name,
            event_id = event.id,
            priority = %event.priority,
            %incoming,
            "queue full; dropped oldest lower-priority event"
        );
        self.bus.publish(
            Report::new(ReportKind::EventDropped)
                .with_event(event.id, Arc::clone(&event.name))
                .with_reason(format!("evicted by incoming {incoming} event")),
        );
        if let Some(waiter) = dropped.waiter {
            let _ = waiter.send(Err(DeliveryError::Closed));
        }
    }
}

/// Dequeues events in priority order and spawns their deliveries until stopped.
async fn drain_loop(inner: Arc<Inner>) -> JoinSet<()> {
    let mut deliveries = JoinSet::new();
    tracing::debug!("drain loop started");

    loop {
        if inner.stop.is_cancelled() {
            break;
        }
        if let Some(queued) = inner.queue.pop_critical() {
            spawn_delivery(&inner, &mut deliveries, queued, None);
            continue;
        }

        let permit = match &inner.limiter {
            Some(sem) => select! {
                biased;
                _ = inner.stop.cancelled() => break,
                _ = inner.queue.critical_ready() => continue,
                permit = Arc::clone(sem).acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_closed) => break,
                },
            },
            None => None,
        };

        let queued = select! {
            biased;
            _ = inner.stop.cancelled() => break,
            next = inner.queue.next() => match next {
                Some(queued) => queued,
                None => break,
            },
        };

        spawn_delivery(&inner, &mut deliveries, queued, permit);
    }

    tracing::debug!(in_flight = deliveries.len(), "drain loop stopped");
    deliveries
}

/// Resolves the listeners of `queued`, takes their start turns and spawns the delivery.
fn spawn_delivery(
    inner: &Arc<Inner>,
    deliveries: &mut JoinSet<()>,
    queued: Queued,
    permit: Option<OwnedSemaphorePermit>,
) {
    while deliveries.try_join_next().is_some() {}

    let routes = inner
        .registry
        .resolve(&queued.event.name)
        .into_iter()
        .map(|route| {
            let turn = route.turn();
            (route, turn)
        })
        .collect();
    let worker = Arc::clone(inner);
    deliveries.spawn(async move {
        let _permit = permit;
        worker.deliver_event(queued, routes).await;
    });
}
