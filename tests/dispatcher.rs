use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use eventvisor::{
    BackoffPolicy, DeliveryError, DeliveryStatus, Dispatcher, DispatcherConfig, EmitError, Event,
    HandlerError, ListenerFn, ListenerRef, ListenerStatus, OverflowPolicy, Priority, Report,
    ReportKind, RetryPolicy, RuntimeError,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

type Log = Arc<Mutex<Vec<String>>>;

/// Listener that appends `"{listener}:{event}"` to `log` and succeeds.
fn recorder(name: &'static str, log: &Log) -> ListenerRef {
    let log = Arc::clone(log);
    ListenerFn::arc(name, move |ev: Arc<Event>| {
        let log = Arc::clone(&log);
        async move {
            log.lock().push(format!("{name}:{}", ev.name));
            Ok::<(), HandlerError>(())
        }
    })
}

/// Listener that fails the first `failures` attempts, then succeeds.
fn flaky(name: &'static str, failures: u32, calls: &Arc<AtomicU32>) -> ListenerRef {
    let calls = Arc::clone(calls);
    ListenerFn::arc(name, move |_ev: Arc<Event>| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n <= failures {
                Err(HandlerError::fail(format!("boom #{n}")))
            } else {
                Ok(())
            }
        }
    })
}

/// Advances paused time a little so queued deliveries run to completion.
async fn settle() {
    time::sleep(Duration::from_millis(10)).await;
}

fn drain_reports(rx: &mut broadcast::Receiver<Report>) -> Vec<Report> {
    let mut out = Vec::new();
    while let Ok(report) = rx.try_recv() {
        out.push(report);
    }
    out
}

fn build(cfg: DispatcherConfig) -> Arc<Dispatcher> {
    Dispatcher::builder(cfg).build().unwrap()
}

#[tokio::test(start_paused = true)]
async fn same_priority_is_fifo() {
    let log = Log::default();
    let d = build(DispatcherConfig::default());
    d.on("*", recorder("all", &log)).unwrap();

    for i in 0..20 {
        d.emit(format!("tick.n{i}"), json!({ "i": i })).unwrap();
    }
    settle().await;

    let expected: Vec<String> = (0..20).map(|i| format!("all:tick.n{i}")).collect();
    assert_eq!(*log.lock(), expected);
}

#[tokio::test(start_paused = true)]
async fn high_priority_runs_before_normal() {
    let log = Log::default();
    let d = Dispatcher::builder(DispatcherConfig::default())
        .with_listener("form.submit", recorder("forms", &log))
        .with_listener("page.view", recorder("pages", &log))
        .build()
        .unwrap();

    d.emit_with("form.submit", json!({ "form_id": "signup" }), Priority::High)
        .unwrap();
    d.emit_with("page.view", json!({ "path": "/" }), Priority::Normal)
        .unwrap();
    settle().await;

    assert_eq!(
        *log.lock(),
        vec!["forms:form.submit".to_string(), "pages:page.view".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn pending_buckets_drain_in_priority_order() {
    let log = Log::default();
    let d = build(DispatcherConfig::default());
    d.on("*", recorder("all", &log)).unwrap();

    d.emit_with("low.a", json!(null), Priority::Low).unwrap();
    d.emit_with("normal.a", json!(null), Priority::Normal).unwrap();
    d.emit_str_priority("critical.a", json!(null), "CRITICAL").unwrap();
    d.emit_with("high.a", json!(null), Priority::High).unwrap();
    d.emit_with("low.b", json!(null), Priority::Low).unwrap();
    d.emit_with("high.b", json!(null), Priority::High).unwrap();
    settle().await;

    assert_eq!(
        *log.lock(),
        vec![
            "all:critical.a",
            "all:high.a",
            "all:high.b",
            "all:normal.a",
            "all:low.a",
            "all:low.b"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn wildcard_and_exact_listeners_both_receive() {
    let log = Log::default();
    let d = build(DispatcherConfig::default());
    d.on("form.submit", recorder("exact", &log)).unwrap();
    d.on("form.*", recorder("prefix", &log)).unwrap();
    d.on("*", recorder("any", &log)).unwrap();

    d.emit("form.submit", json!({})).unwrap();
    d.emit("form", json!({})).unwrap();
    d.emit("form.step.two", json!({})).unwrap();
    settle().await;

    let mut seen = log.lock().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            "any:form",
            "any:form.step.two",
            "any:form.submit",
            "exact:form.submit",
            "prefix:form.step.two",
            "prefix:form.submit",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn critical_resolves_after_every_listener() {
    let slow_done = Arc::new(AtomicU32::new(0));
    let d = build(DispatcherConfig::default());

    let done = Arc::clone(&slow_done);
    let slow: ListenerRef = ListenerFn::arc("slow", move |_ev: Arc<Event>| {
        let done = Arc::clone(&done);
        async move {
            time::sleep(Duration::from_millis(300)).await;
            done.fetch_add(1, Ordering::SeqCst);
            Ok::<(), HandlerError>(())
        }
    });
    let calls = Arc::new(AtomicU32::new(0));
    d.on("order.created", slow).unwrap();
    d.on("order.*", flaky("fast", 0, &calls)).unwrap();

    let report = d
        .emit_critical("order.created", json!({ "order_id": 42 }))
        .await
        .unwrap();

    assert_eq!(slow_done.load(Ordering::SeqCst), 1);
    assert_eq!(report.status(), DeliveryStatus::Delivered);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.event.priority, Priority::Critical);
    assert_eq!(report.event.payload, json!({ "order_id": 42 }));
    assert_eq!(report.outcome("fast").unwrap().attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn critical_reports_failure_after_retries() {
    let calls = Arc::new(AtomicU32::new(0));
    let d = build(DispatcherConfig::default());
    d.on("order.created", flaky("broken", u32::MAX, &calls)).unwrap();

    let err = d
        .emit_critical("order.created", json!({ "order_id": 42 }))
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let report = err.report().expect("listeners ran");
    assert_eq!(report.status(), DeliveryStatus::Failed);
    let outcome = report.outcome("broken").unwrap();
    assert_eq!(outcome.attempts, 3);
    assert_eq!(
        outcome.status,
        ListenerStatus::Failed(HandlerError::fail("boom #3"))
    );
    assert_eq!(err.as_label(), "delivery_failed");
}

#[tokio::test(start_paused = true)]
async fn always_failing_handler_backs_off_between_three_attempts() {
    let mut cfg = DispatcherConfig::default();
    cfg.retry = RetryPolicy {
        max_attempts: 3,
        backoff: BackoffPolicy {
            first: Duration::from_millis(100),
            ..BackoffPolicy::default()
        },
    };
    let d = build(cfg);
    let mut rx = d.reports();
    let calls = Arc::new(AtomicU32::new(0));
    d.on("sync.push", flaky("push", u32::MAX, &calls)).unwrap();

    let start = Instant::now();
    d.emit("sync.push", json!({})).unwrap();
    time::sleep(Duration::from_secs(5)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let reports = drain_reports(&mut rx);
    let delays: Vec<u32> = reports
        .iter()
        .filter(|r| r.kind == ReportKind::BackoffScheduled)
        .filter_map(|r| r.delay_ms)
        .collect();
    assert_eq!(delays, vec![100, 200]);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));

    let exhausted = reports
        .iter()
        .find(|r| r.kind == ReportKind::ListenerExhausted)
        .expect("listener gives up");
    assert_eq!(exhausted.attempt, Some(3));
    assert!(reports.iter().any(|r| r.kind == ReportKind::EventFailed));
    assert_eq!(d.stats().failed, 1);
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn handler_succeeding_on_last_attempt_is_success() {
    let calls = Arc::new(AtomicU32::new(0));
    let d = build(DispatcherConfig::default());
    d.on("sync.push", flaky("push", 2, &calls)).unwrap();

    let report = d.emit_critical("sync.push", json!({})).await.unwrap();
    assert_eq!(report.outcome("push").unwrap().attempts, 3);
    assert_eq!(
        report.outcome("push").unwrap().status,
        ListenerStatus::Succeeded
    );
}

#[tokio::test(start_paused = true)]
async fn fatal_errors_are_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let d = build(DispatcherConfig::default());
    let strict: ListenerRef = ListenerFn::arc("strict", move |_ev: Arc<Event>| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err(HandlerError::fatal("schema mismatch")) }
    });
    d.on("user.*", strict).unwrap();

    let err = d.emit_critical("user.signup", json!({})).await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.report().unwrap().outcome("strict").unwrap().attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_does_not_block_siblings_or_later_events() {
    let mut cfg = DispatcherConfig::default();
    cfg.handler_timeout = Duration::from_secs(1);
    cfg.retry = RetryPolicy::never();
    let d = build(cfg);

    let stuck: ListenerRef = ListenerFn::arc("stuck", |_ev: Arc<Event>| async {
        time::sleep(Duration::from_secs(3600)).await;
        Ok::<(), HandlerError>(())
    });
    let calls = Arc::new(AtomicU32::new(0));
    d.on("job.run", stuck).unwrap();
    d.on("job.*", flaky("sibling", 0, &calls)).unwrap();
    d.on("ping", flaky("pinger", 0, &calls)).unwrap();

    let start = Instant::now();
    let job = {
        let d = Arc::clone(&d);
        tokio::spawn(async move { d.emit_critical("job.run", json!({})).await })
    };
    settle().await;

    d.emit_critical("ping", json!({})).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let report = job.await.unwrap().unwrap_err().report().cloned().unwrap();
    assert_eq!(report.status(), DeliveryStatus::PartiallyFailed);
    assert_eq!(
        report.outcome("stuck").unwrap().status,
        ListenerStatus::Failed(HandlerError::Timeout {
            timeout: Duration::from_secs(1)
        })
    );
    assert_eq!(
        report.outcome("sibling").unwrap().status,
        ListenerStatus::Succeeded
    );
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn panicking_listener_does_not_stop_the_drain_loop() {
    let log = Log::default();
    let mut cfg = DispatcherConfig::default();
    cfg.retry = RetryPolicy::never();
    let d = build(cfg);

    let boom: ListenerRef = ListenerFn::arc("boom", |_ev: Arc<Event>| async {
        if true {
            panic!("listener bug");
        }
        Ok::<(), HandlerError>(())
    });
    d.on("crash.now", boom).unwrap();
    d.on("after.crash", recorder("after", &log)).unwrap();

    let err = d.emit_critical("crash.now", json!({})).await.unwrap_err();
    assert!(matches!(
        err.report().unwrap().outcome("boom").unwrap().status,
        ListenerStatus::Failed(HandlerError::Panicked { .. })
    ));

    d.emit("after.crash", json!({})).unwrap();
    settle().await;
    assert_eq!(*log.lock(), vec!["after:after.crash".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unrouted_critical_event_succeeds() {
    let d = build(DispatcherConfig::default());
    let mut rx = d.reports();

    let report = d.emit_critical("nobody.listens", json!({})).await.unwrap();
    assert_eq!(report.status(), DeliveryStatus::Unrouted);
    assert!(report.outcomes.is_empty());
    assert!(
        drain_reports(&mut rx)
            .iter()
            .any(|r| r.kind == ReportKind::EventUnrouted)
    );
    assert_eq!(d.stats().unrouted, 1);
}

#[tokio::test(start_paused = true)]
async fn late_registration_does_not_replay_past_events() {
    let log = Log::default();
    let d = build(DispatcherConfig::default());

    d.emit_critical("cart.updated", json!({ "items": 1 }))
        .await
        .unwrap();
    d.on("cart.*", recorder("late", &log)).unwrap();
    settle().await;
    assert!(log.lock().is_empty());

    d.emit("cart.updated", json!({ "items": 2 })).unwrap();
    settle().await;
    assert_eq!(*log.lock(), vec!["late:cart.updated".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unregister_mid_drain_stops_further_attempts() {
    let calls = Arc::new(AtomicU32::new(0));
    let d = build(DispatcherConfig::default());
    let listener = flaky("retrying", u32::MAX, &calls);
    d.on("mail.send", Arc::clone(&listener)).unwrap();

    let pending = {
        let d = Arc::clone(&d);
        tokio::spawn(async move { d.emit_critical("mail.send", json!({})).await })
    };
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(d.off("mail.send", &listener));
    assert!(!d.off("mail.send", &listener));

    let report = pending.await.unwrap().unwrap();
    let outcome = report.outcome("retrying").unwrap();
    assert_eq!(outcome.status, ListenerStatus::Removed);
    assert_eq!(outcome.attempts, 1);

    d.emit("mail.send", json!({})).unwrap();
    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn listener_unregistered_by_a_sibling_never_starts() {
    let d = build(DispatcherConfig::default());
    let second_calls = Arc::new(AtomicU32::new(0));
    let second = flaky("second", 0, &second_calls);

    let removed = Arc::new(AtomicU32::new(0));
    let first: ListenerRef = {
        let weak = Arc::downgrade(&d);
        let second = Arc::clone(&second);
        let removed = Arc::clone(&removed);
        ListenerFn::arc("first", move |_ev: Arc<Event>| {
            if let Some(d) = weak.upgrade() {
                if d.off("cart.checkout", &second) {
                    removed.fetch_add(1, Ordering::SeqCst);
                }
            }
            async { Ok::<(), HandlerError>(()) }
        })
    };
    d.on("cart.checkout", first).unwrap();
    d.on("cart.checkout", Arc::clone(&second)).unwrap();

    let report = d.emit_critical("cart.checkout", json!({})).await.unwrap();

    assert_eq!(removed.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.outcome("first").unwrap().status, ListenerStatus::Succeeded);
    assert_eq!(report.outcome("second").unwrap().status, ListenerStatus::Removed);
}

#[tokio::test(start_paused = true)]
async fn handler_stays_subscribed_through_its_remaining_pattern() {
    let calls = Arc::new(AtomicU32::new(0));
    let d = build(DispatcherConfig::default());
    let crm = flaky("crm", 1, &calls);
    d.on("form.*", Arc::clone(&crm)).unwrap();
    d.on("form.submit", Arc::clone(&crm)).unwrap();

    let pending = {
        let d = Arc::clone(&d);
        tokio::spawn(async move { d.emit_critical("form.submit", json!({})).await })
    };
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(d.off("form.*", &crm));

    let report = pending.await.unwrap().unwrap();
    let outcome = report.outcome("crm").unwrap();
    assert_eq!(outcome.status, ListenerStatus::Succeeded);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn registration_is_idempotent_and_removable_by_id() {
    let log = Log::default();
    let d = build(DispatcherConfig::default());
    let listener = recorder("audit", &log);

    let id = d.on("audit.*", Arc::clone(&listener)).unwrap();
    assert_eq!(d.on("audit.*", Arc::clone(&listener)).unwrap(), id);
    d.on("audit.login", Arc::clone(&listener)).unwrap();
    assert_eq!(d.listener_count(), 2);

    // Same handler through two patterns: invoked once.
    d.emit("audit.login", json!({})).unwrap();
    settle().await;
    assert_eq!(log.lock().len(), 1);

    assert!(d.off_id(id));
    assert!(!d.off_id(id));
    assert_eq!(d.listener_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_input_is_rejected_synchronously() {
    let d = build(DispatcherConfig::default());

    assert!(matches!(
        d.emit_str_priority("page.view", json!({}), "urgent"),
        Err(EmitError::InvalidPriority { .. })
    ));
    assert!(matches!(
        d.emit("page..view", json!({})),
        Err(EmitError::InvalidName { .. })
    ));
    assert!(matches!(
        d.emit_critical("", json!({})).await,
        Err(DeliveryError::Rejected(EmitError::InvalidName { .. }))
    ));

    let log = Log::default();
    assert!(matches!(
        d.on("form.*.submit", recorder("bad", &log)),
        Err(EmitError::InvalidPattern { .. })
    ));

    let stats = d.stats();
    assert_eq!(stats.rejected, 3);
    assert_eq!(stats.emitted, 0);
}

#[tokio::test(start_paused = true)]
async fn full_queue_drops_oldest_lower_priority() {
    let log = Log::default();
    let mut cfg = DispatcherConfig::default();
    cfg.queue_capacity = 2;
    let d = build(cfg);
    let mut rx = d.reports();
    d.on("*", recorder("all", &log)).unwrap();

    d.emit_with("metrics.a", json!({}), Priority::Low).unwrap();
    d.emit_with("metrics.b", json!({}), Priority::Low).unwrap();
    d.emit_with("order.paid", json!({}), Priority::High).unwrap();
    assert_eq!(d.pending(), 2);
    settle().await;

    assert_eq!(*log.lock(), vec!["all:order.paid", "all:metrics.b"]);
    let dropped: Vec<_> = drain_reports(&mut rx)
        .into_iter()
        .filter(|r| r.kind == ReportKind::EventDropped)
        .collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].event_name.as_deref(), Some("metrics.a"));
    assert_eq!(d.stats().dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn reject_new_policy_refuses_when_full() {
    let mut cfg = DispatcherConfig::default();
    cfg.queue_capacity = 1;
    cfg.overflow = OverflowPolicy::RejectNew;
    let d = build(cfg);

    d.emit("a.one", json!({})).unwrap();
    assert_eq!(
        d.emit_with("a.two", json!({}), Priority::Critical),
        Err(EmitError::QueueFull { capacity: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn critical_does_not_wait_for_an_in_flight_slot() {
    let mut cfg = DispatcherConfig::default();
    cfg.max_in_flight = 2;
    cfg.handler_timeout = Duration::ZERO;
    let d = build(cfg);

    let stuck: ListenerRef = ListenerFn::arc("stuck", |_ev: Arc<Event>| async {
        time::sleep(Duration::from_secs(3600)).await;
        Ok::<(), HandlerError>(())
    });
    let calls = Arc::new(AtomicU32::new(0));
    d.on("analytics.*", stuck).unwrap();
    d.on("order.created", flaky("orders", 0, &calls)).unwrap();

    d.emit("analytics.first", json!({})).unwrap();
    d.emit("analytics.second", json!({})).unwrap();
    d.emit("order.created", json!({ "id": 1 })).unwrap();
    settle().await;
    assert_eq!(d.pending(), 1);

    let started = Instant::now();
    let report = time::timeout(
        Duration::from_secs(1),
        d.emit_critical("order.created", json!({ "id": 2 })),
    )
    .await
    .expect("critical emit waited for a free slot")
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.status(), DeliveryStatus::Delivered);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(d.pending(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_fails_waiters_and_aborts_after_grace() {
    let mut cfg = DispatcherConfig::default();
    cfg.max_in_flight = 1;
    cfg.handler_timeout = Duration::ZERO;
    cfg.shutdown_grace = Duration::from_secs(1);
    let d = build(cfg);

    let stuck: ListenerRef = ListenerFn::arc("stuck", |_ev: Arc<Event>| async {
        time::sleep(Duration::from_secs(3600)).await;
        Ok::<(), HandlerError>(())
    });
    d.on("slow.*", stuck).unwrap();

    d.emit("slow.first", json!({})).unwrap();
    d.emit("slow.second", json!({})).unwrap();
    let waiter = {
        let d = Arc::clone(&d);
        tokio::spawn(async move { d.emit_critical("slow.third", json!({})).await })
    };
    settle().await;
    assert_eq!(d.pending(), 1);

    let res = d.shutdown().await;
    assert!(matches!(
        res,
        Err(RuntimeError::GraceExceeded { aborted: 2, .. })
    ));
    assert!(matches!(waiter.await.unwrap(), Err(DeliveryError::Closed)));

    assert!(d.is_closed());
    assert_eq!(d.emit("slow.fourth", json!({})), Err(EmitError::Closed));
    assert!(d.shutdown().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_deliveries() {
    let calls = Arc::new(AtomicU32::new(0));
    let d = build(DispatcherConfig::default());
    d.on("flush.*", flaky("flush", 1, &calls)).unwrap();

    d.emit("flush.now", json!({})).unwrap();
    settle().await;
    d.shutdown().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(d.stats().delivered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fifo_holds_on_a_multi_thread_runtime() {
    const EVENTS: u64 = 2000;
    let seen: Arc<Mutex<Vec<u64>>> = Arc::default();
    let d = build(DispatcherConfig::default());

    let sink = Arc::clone(&seen);
    let tap: ListenerRef = ListenerFn::arc("tap", move |ev: Arc<Event>| {
        if let Some(i) = ev.payload["i"].as_u64() {
            sink.lock().push(i);
        }
        async { Ok::<(), HandlerError>(()) }
    });
    d.on("*", tap).unwrap();

    for i in 0..EVENTS {
        d.emit("tick.t", json!({ "i": i })).unwrap();
    }

    time::timeout(Duration::from_secs(30), async {
        while (seen.lock().len() as u64) < EVENTS {
            time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("every event delivered");

    let seen = seen.lock().clone();
    let expected: Vec<u64> = (0..EVENTS).collect();
    assert_eq!(seen, expected);
    d.shutdown().await.unwrap();
}
