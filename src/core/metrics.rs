// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle, no matter how many servers a
//! process starts.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};
use tracing::warn;

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of clients currently held in a connection registry.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("kvserver_connected_clients", "Number of currently connected clients.").unwrap();

    // --- Server-wide Counters ---
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("kvserver_connections_received_total", "Total number of connections received.").unwrap();
    /// The total number of connections that ended because the client closed its stream.
    pub static ref CONNECTIONS_DROPPED_TOTAL: Counter =
        register_counter!("kvserver_connections_dropped_total", "Total number of connections closed by their client.").unwrap();
    /// The total number of requests handled by the core serializer, labeled by request kind.
    pub static ref REQUESTS_PROCESSED_TOTAL: CounterVec =
        register_counter_vec!("kvserver_requests_processed_total", "Total number of requests processed, labeled by kind.", &["kind"]).unwrap();
    /// The total number of request lines discarded because they could not be parsed.
    pub static ref MALFORMED_REQUESTS_TOTAL: Counter =
        register_counter!("kvserver_malformed_requests_total", "Total number of malformed request lines dropped.").unwrap();
    /// The total number of lookup responses shed because a client's outgoing queue was full.
    pub static ref RESPONSES_SHED_TOTAL: Counter =
        register_counter!("kvserver_responses_shed_total", "Total number of lookup response lines dropped under overload.").unwrap();

    // --- Histograms ---
    /// A histogram of time spent handling a single request inside the core serializer.
    pub static ref REQUEST_LATENCY_SECONDS: Histogram =
        register_histogram!("kvserver_request_latency_seconds", "Latency of request processing in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| {
            warn!("Failed to encode metrics: {}", e);
            String::new()
        })
}
