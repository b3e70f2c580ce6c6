//! # Example: analytics_bridge
//!
//! Attaches a [`Bridge`] to the dispatcher so UI events are forwarded to an
//! analytics backend. The backend here is a toy sink that is unavailable for
//! its first call; the bridge's delivery is retried like any other listener.
//!
//! ## Mapping
//! ```text
//! form.submit {form_id}   ─► form_submit { form_id, event_id, priority, source, emitted_at_ms }
//! page.view   {path}      ─► $pageview   { path, ... }           (explicit rename)
//! score.set   42          ─► score_set   { value: 42, ... }      (scalar payload wrapped)
//! internal.gc {}          ─► not forwarded (no matching pattern)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example analytics_bridge
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use eventvisor::{
    AnalyticsSink, Bridge, BridgeConfig, Dispatcher, DispatcherConfig, EmitRequest, LogSink,
    SinkError, TrackedEvent,
};
use serde_json::json;

/// Prints tracked events as JSON; refuses the very first call.
#[derive(Default)]
struct StdoutSink {
    warmed_up: AtomicBool,
}

#[async_trait]
impl AnalyticsSink for StdoutSink {
    async fn track(&self, event: TrackedEvent) -> Result<(), SinkError> {
        if !self.warmed_up.swap(true, Ordering::SeqCst) {
            return Err(SinkError::Unavailable("connection pool warming up".into()));
        }
        let line = serde_json::to_string(&event).map_err(|e| SinkError::Rejected(e.to_string()))?;
        println!("[track] {line}");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("eventvisor=info")
        .init();

    let dispatcher = Dispatcher::builder(DispatcherConfig::default()).build()?;

    // Product analytics: forms, page views and scores.
    let product = Bridge::new(
        StdoutSink::default(),
        BridgeConfig::new(["form.*", "page.view", "score.*"]).rename("page.view", "$pageview"),
    );
    dispatcher.attach_bridge(Arc::new(product))?;

    // Everything, without metadata, to the log.
    let audit = Bridge::new(LogSink, BridgeConfig::default().with_metadata(false));
    dispatcher.attach_bridge(Arc::new(audit))?;

    dispatcher.emit_request(
        EmitRequest::new("form.submit", json!({ "form_id": "signup" })).with_source("web"),
    )?;
    dispatcher.emit("page.view", json!({ "path": "/pricing" }))?;
    dispatcher.emit("score.set", json!(42))?;
    dispatcher.emit("internal.gc", json!({}))?;

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("stats: {:?}", dispatcher.stats());

    dispatcher.shutdown().await?;
    Ok(())
}
