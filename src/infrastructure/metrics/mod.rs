//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Active WebSocket connection gauge
//! - Realtime events published and delivered, by event name
//! - Matches created and messages sent
//! - Store and publish retries, by operation

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "matchmaker";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Identified WebSocket connections held by this process
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of identified WebSocket connections",
        )
        .namespace(NAMESPACE),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

pub static EVENTS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_published_total", "Realtime events published to the bus")
            .namespace(NAMESPACE),
        &["event"],
    )
    .expect("Failed to create EVENTS_PUBLISHED_TOTAL metric")
});

/// Counted once per local connection an event reached
pub static EVENTS_DELIVERED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "events_delivered_total",
            "Realtime events delivered to local connections",
        )
        .namespace(NAMESPACE),
        &["event"],
    )
    .expect("Failed to create EVENTS_DELIVERED_TOTAL metric")
});

pub static MATCHES_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("matches_created_total", "Matches created from mutual likes")
            .namespace(NAMESPACE),
    )
    .expect("Failed to create MATCHES_CREATED_TOTAL metric")
});

pub static MESSAGES_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("messages_sent_total", "Chat messages persisted").namespace(NAMESPACE),
    )
    .expect("Failed to create MESSAGES_SENT_TOTAL metric")
});

pub static STORE_RETRIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "store_retries_total",
            "Retried store and publish calls after a transient failure",
        )
        .namespace(NAMESPACE),
        &["operation"],
    )
    .expect("Failed to create STORE_RETRIES_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(EVENTS_PUBLISHED_TOTAL.clone()))
        .expect("Failed to register EVENTS_PUBLISHED_TOTAL");
    registry
        .register(Box::new(EVENTS_DELIVERED_TOTAL.clone()))
        .expect("Failed to register EVENTS_DELIVERED_TOTAL");
    registry
        .register(Box::new(MATCHES_CREATED_TOTAL.clone()))
        .expect("Failed to register MATCHES_CREATED_TOTAL");
    registry
        .register(Box::new(MESSAGES_SENT_TOTAL.clone()))
        .expect("Failed to register MESSAGES_SENT_TOTAL");
    registry
        .register(Box::new(STORE_RETRIES_TOTAL.clone()))
        .expect("Failed to register STORE_RETRIES_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn websocket_connected() {
    WEBSOCKET_CONNECTIONS_ACTIVE.inc();
}

pub fn websocket_disconnected() {
    WEBSOCKET_CONNECTIONS_ACTIVE.dec();
}

pub fn record_event_published(event: &str) {
    EVENTS_PUBLISHED_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_event_delivered(event: &str, connections: usize) {
    EVENTS_DELIVERED_TOTAL
        .with_label_values(&[event])
        .inc_by(connections as u64);
}

pub fn record_match_created() {
    MATCHES_CREATED_TOTAL.inc();
}

pub fn record_message_sent() {
    MESSAGES_SENT_TOTAL.inc();
}

pub fn record_retry(operation: &str) {
    STORE_RETRIES_TOTAL.with_label_values(&[operation]).inc();
}
