//! # Example: priority_dispatch
//!
//! Emits a burst of events at different priorities and shows that the
//! dispatcher drains them highest priority first, oldest first within a
//! priority. One listener fails twice before succeeding so the retry
//! backoff shows up in the report stream.
//!
//! ## Flow
//! ```text
//! emit(page.view, normal) ─┐
//! emit(metrics.flush, low) ├─► queue ─► form.submit ─► page.view ─► metrics.flush
//! emit(form.submit, high) ─┘
//!
//! emit_critical(order.created)
//!   ├─► attempt 1 → Err, BackoffScheduled{100ms}
//!   ├─► attempt 2 → Err, BackoffScheduled{200ms}
//!   └─► attempt 3 → Ok  → caller resumes with the DeliveryReport
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=eventvisor=debug cargo run --example priority_dispatch
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use eventvisor::{
    Dispatcher, DispatcherConfig, Event, HandlerError, ListenerFn, ListenerRef, Priority,
    ReportKind,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

static ORDER_ATTEMPTS: AtomicU32 = AtomicU32::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eventvisor=info")),
        )
        .init();

    // 1. Listeners: one printer for everything, one flaky order handler.
    let printer: ListenerRef = ListenerFn::arc("printer", |ev: Arc<Event>| async move {
        println!("[{:<8}] {} {}", ev.priority, ev.name, ev.payload);
        Ok::<(), HandlerError>(())
    });
    let orders: ListenerRef = ListenerFn::arc("orders", |ev: Arc<Event>| async move {
        let attempt = ORDER_ATTEMPTS.fetch_add(1, Ordering::Relaxed) + 1;
        if attempt <= 2 {
            return Err(HandlerError::fail(format!("inventory service down (#{attempt})")));
        }
        println!("[orders  ] reserved stock for {}", ev.payload);
        Ok(())
    });

    // 2. Dispatcher with the default policy (3 attempts, 100ms doubling backoff).
    let dispatcher = Dispatcher::builder(DispatcherConfig::default())
        .with_listener("*", printer)
        .with_listener("order.created", orders)
        .build()?;

    // 3. Print backoff decisions from the report stream.
    let mut reports = dispatcher.reports();
    let watcher = tokio::spawn(async move {
        while let Ok(report) = reports.recv().await {
            if report.kind == ReportKind::BackoffScheduled {
                println!(
                    "[backoff ] listener={:?} after_attempt={:?} delay_ms={:?}",
                    report.listener, report.attempt, report.delay_ms
                );
            }
        }
    });

    // 4. Burst of fire-and-forget events.
    dispatcher.emit("page.view", json!({ "path": "/pricing" }))?;
    dispatcher.emit_with("metrics.flush", json!({ "count": 12 }), Priority::Low)?;
    dispatcher.emit_with("form.submit", json!({ "form_id": "signup" }), Priority::High)?;

    // 5. A critical event the caller waits for.
    let report = dispatcher
        .emit_critical("order.created", json!({ "order_id": 1001 }))
        .await?;
    println!(
        "order.created delivered to {} listener(s), status {:?}",
        report.outcomes.len(),
        report.status()
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("stats: {:?}", dispatcher.stats());

    dispatcher.shutdown().await?;
    watcher.abort();
    Ok(())
}
