use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use eventvisor::{
    AnalyticsSink, Bridge, BridgeConfig, DeliveryStatus, Dispatcher, DispatcherConfig,
    EmitRequest, HandlerError, ListenerStatus, LogSink, Priority, SinkError, TrackedEvent,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::time;

/// Sink that records what it accepts and refuses the first `outages` calls.
#[derive(Default)]
struct MemorySink {
    tracked: Mutex<Vec<TrackedEvent>>,
    calls: AtomicU32,
    outages: u32,
    reject: bool,
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn track(&self, event: TrackedEvent) -> Result<(), SinkError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject {
            return Err(SinkError::Rejected("unknown event".into()));
        }
        if n <= self.outages {
            return Err(SinkError::Unavailable(format!("outage #{n}")));
        }
        self.tracked.lock().push(event);
        Ok(())
    }
}

fn names(sink: &MemorySink) -> Vec<String> {
    sink.tracked.lock().iter().map(|e| e.name.clone()).collect()
}

#[tokio::test(start_paused = true)]
async fn forwards_only_matching_events() {
    let sink = Arc::new(MemorySink::default());
    let bridge = Bridge::with_shared_sink(
        Arc::clone(&sink),
        BridgeConfig::new(["form.*", "page.view"]).rename("page.view", "$pageview"),
    );
    let d = Dispatcher::builder(DispatcherConfig::default())
        .build()
        .unwrap();
    let ids = d.attach_bridge(Arc::new(bridge)).unwrap();
    assert_eq!(ids.len(), 2);

    d.emit_with("form.submit", json!({ "form_id": "signup" }), Priority::High)
        .unwrap();
    d.emit("page.view", json!({ "path": "/pricing" })).unwrap();
    d.emit("internal.tick", json!({})).unwrap();
    time::sleep(Duration::from_millis(10)).await;

    assert_eq!(names(&sink), vec!["form_submit", "$pageview"]);
    let tracked = sink.tracked.lock();
    assert_eq!(tracked[0].property("form_id"), Some(&json!("signup")));
    assert_eq!(tracked[0].property("priority"), Some(&json!("high")));
    assert_eq!(tracked[1].property("path"), Some(&json!("/pricing")));
}

#[tokio::test(start_paused = true)]
async fn source_and_metadata_flow_through() {
    let sink = Arc::new(MemorySink::default());
    let bridge = Arc::new(Bridge::with_shared_sink(
        Arc::clone(&sink),
        BridgeConfig::default(),
    ));
    let d = Dispatcher::builder(DispatcherConfig::default())
        .with_bridge(bridge)
        .build()
        .unwrap();

    let report = d
        .emit_critical_request(EmitRequest::new("lead.created", json!("acme")).with_source("crm"))
        .await
        .unwrap();

    let tracked = sink.tracked.lock();
    assert_eq!(tracked.len(), 1);
    let ev = &tracked[0];
    assert_eq!(ev.name, "lead_created");
    assert_eq!(ev.property("value"), Some(&json!("acme")));
    assert_eq!(ev.property("source"), Some(&json!("crm")));
    assert_eq!(ev.property("priority"), Some(&json!("critical")));
    assert_eq!(ev.property("event_id"), Some(&json!(report.event.id)));
    assert_eq!(
        ev.property("emitted_at_ms"),
        Some(&json!(report.event.timestamp_ms()))
    );
}

#[tokio::test(start_paused = true)]
async fn unavailable_sink_is_retried() {
    let sink = Arc::new(MemorySink {
        outages: 2,
        ..MemorySink::default()
    });
    let d = Dispatcher::builder(DispatcherConfig::default())
        .with_bridge(Arc::new(Bridge::with_shared_sink(
            Arc::clone(&sink),
            BridgeConfig::new(["checkout.*"]),
        )))
        .build()
        .unwrap();

    let report = d
        .emit_critical("checkout.completed", json!({ "total": 99 }))
        .await
        .unwrap();

    assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    assert_eq!(names(&sink), vec!["checkout_completed"]);
    assert_eq!(report.outcome("analytics-bridge").unwrap().attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn rejecting_sink_fails_without_retry() {
    let sink = Arc::new(MemorySink {
        reject: true,
        ..MemorySink::default()
    });
    let d = Dispatcher::builder(DispatcherConfig::default())
        .build()
        .unwrap();
    d.attach_bridge(Arc::new(Bridge::with_shared_sink(
        Arc::clone(&sink),
        BridgeConfig::default(),
    )))
    .unwrap();

    let err = d
        .emit_critical("order.created", json!({}))
        .await
        .unwrap_err();

    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    let report = err.report().unwrap();
    assert_eq!(report.status(), DeliveryStatus::Failed);
    assert!(matches!(
        report.outcome("analytics-bridge").unwrap().status,
        ListenerStatus::Failed(HandlerError::Fatal { .. })
    ));

    // The drain loop keeps going after a sink failure.
    assert!(d.emit("order.shipped", json!({})).is_ok());
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn log_sink_accepts_everything() {
    let d = Dispatcher::builder(DispatcherConfig::default())
        .with_bridge(Arc::new(Bridge::new(LogSink, BridgeConfig::default())))
        .build()
        .unwrap();
    let report = d.emit_critical("page.view", json!({ "path": "/" })).await.unwrap();
    assert!(report.is_success());
    d.shutdown().await.unwrap();
}
