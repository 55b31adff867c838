//! Prometheus Metrics Module
//!
//! Provides engine-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Events dispatched by kind
//! - Handler failures by cause (error, panic)
//! - Active listener gauge
//! - Outbound actions by action and outcome
//! - Directory entries by kind

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Events processed by the dispatcher, by event kind
pub static EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_total", "Total number of dispatched events").namespace("chatops_bot"),
        &["kind"],
    )
    .expect("Failed to create EVENTS_TOTAL metric")
});

/// Listener handler faults caught at the per-listener boundary
pub static HANDLER_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "handler_failures_total",
            "Total number of listener handler failures",
        )
        .namespace("chatops_bot"),
        &["cause"], // "error", "panic"
    )
    .expect("Failed to create HANDLER_FAILURES_TOTAL metric")
});

/// Listeners currently eligible for fan-out
pub static LISTENERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("listeners_active", "Number of active listeners").namespace("chatops_bot"),
    )
    .expect("Failed to create LISTENERS_ACTIVE metric")
});

/// Outbound actions performed by the sender loop
pub static OUTBOUND_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("outbound_total", "Total number of outbound actions").namespace("chatops_bot"),
        &["action", "outcome"], // outcome: "sent", "failed", "rejected"
    )
    .expect("Failed to create OUTBOUND_TOTAL metric")
});

/// Entries in the directory cache
pub static DIRECTORY_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("directory_entries", "Number of cached directory entries")
            .namespace("chatops_bot"),
        &["kind"], // "users", "channels"
    )
    .expect("Failed to create DIRECTORY_ENTRIES metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(EVENTS_TOTAL.clone()))
        .expect("Failed to register EVENTS_TOTAL");
    registry
        .register(Box::new(HANDLER_FAILURES_TOTAL.clone()))
        .expect("Failed to register HANDLER_FAILURES_TOTAL");
    registry
        .register(Box::new(LISTENERS_ACTIVE.clone()))
        .expect("Failed to register LISTENERS_ACTIVE");
    registry
        .register(Box::new(OUTBOUND_TOTAL.clone()))
        .expect("Failed to register OUTBOUND_TOTAL");
    registry
        .register(Box::new(DIRECTORY_ENTRIES.clone()))
        .expect("Failed to register DIRECTORY_ENTRIES");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record one dispatched event
pub fn record_event(kind: &str) {
    EVENTS_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper to record a handler fault
pub fn record_handler_failure(cause: &str) {
    HANDLER_FAILURES_TOTAL.with_label_values(&[cause]).inc();
}

/// Helper to update the active listener count
pub fn set_listeners_active(count: usize) {
    LISTENERS_ACTIVE.set(count as i64);
}

/// Helper to record an outbound action outcome
pub fn record_outbound(action: &str, outcome: &str) {
    OUTBOUND_TOTAL.with_label_values(&[action, outcome]).inc();
}

/// Helper to update directory sizes
pub fn set_directory_entries(users: usize, channels: usize) {
    DIRECTORY_ENTRIES
        .with_label_values(&["users"])
        .set(users as i64);
    DIRECTORY_ENTRIES
        .with_label_values(&["channels"])
        .set(channels as i64);
}
