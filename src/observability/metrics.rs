//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count every request and response passing through the pipeline
//! - Serve a JSON snapshot of those counters at `/debug/vars`
//! - Mirror the same events through the `metrics` facade for Prometheus
//!
//! # Metrics
//! - `gatekeeper_requests_total` (counter): requests received
//! - `gatekeeper_responses_total` (counter): responses sent, by status
//! - `gatekeeper_request_duration_seconds` (histogram): processing latency
//! - `gatekeeper_rate_limited_total` (counter): requests rejected with 429
//! - `gatekeeper_auth_failures_total` (counter): gate rejections, by kind
//! - `gatekeeper_tracked_clients` (gauge): limiter entries after a sweep
//!
//! # Design Decisions
//! - Snapshot counters are atomics; per-status counts live in a DashMap
//! - The tracking middleware is the outermost layer, so rejections
//!   produced by inner stages are counted like any other response

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;

/// Lock-free request/response counters for the whole pipeline.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_us: AtomicU64,
    responses_by_status: DashMap<u16, AtomicU64>,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    pub total_processing_time_us: u64,
    pub total_responses_sent_by_status: std::collections::BTreeMap<u16, u64>,
    pub version: &'static str,
    pub timestamp: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("gatekeeper_requests_total").increment(1);
    }

    pub fn record_sent(&self, status: u16, elapsed: std::time::Duration) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.processing_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.responses_by_status
            .entry(status)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);

        ::metrics::counter!("gatekeeper_responses_total", "status" => status.to_string()).increment(1);
        ::metrics::histogram!("gatekeeper_request_duration_seconds").record(elapsed.as_secs_f64());
    }

    pub fn requests_received(&self) -> u64 {
        self.requests_received.load(Ordering::Relaxed)
    }

    pub fn responses_sent(&self) -> u64 {
        self.responses_sent.load(Ordering::Relaxed)
    }

    pub fn responses_with_status(&self, status: u16) -> u64 {
        self.responses_by_status
            .get(&status)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        MetricsSnapshot {
            total_requests_received: self.requests_received(),
            total_responses_sent: self.responses_sent(),
            total_processing_time_us: self.processing_time_us.load(Ordering::Relaxed),
            total_responses_sent_by_status: self
                .responses_by_status
                .iter()
                .map(|entry| (*entry.key(), entry.value().load(Ordering::Relaxed)))
                .collect(),
            version: env!("CARGO_PKG_VERSION"),
            timestamp,
        }
    }
}

/// Outermost middleware: counts the request, runs the rest of the chain,
/// then counts the response whatever its status.
pub async fn track_metrics(
    State(metrics): State<Arc<PipelineMetrics>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    metrics.record_received();

    let response = next.run(request).await;

    metrics.record_sent(response.status().as_u16(), start.elapsed());
    response
}

/// Record a pipeline rejection by its error kind.
pub fn record_rejection(kind: &'static str) {
    match kind {
        "rate_limited" => ::metrics::counter!("gatekeeper_rate_limited_total").increment(1),
        _ => ::metrics::counter!("gatekeeper_auth_failures_total", "kind" => kind).increment(1),
    }
}

/// Record how many clients the limiter tracks after a sweep.
pub fn record_tracked_clients(count: usize) {
    ::metrics::gauge!("gatekeeper_tracked_clients").set(count as f64);
}

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}
