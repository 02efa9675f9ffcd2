//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wayfarer_requests_total` (counter): dispatched requests by method,
//!   status, route template
//! - `wayfarer_request_duration_seconds` (histogram): dispatch latency
//! - `wayfarer_cache_events_total` (counter): cache hits and misses
//! - `wayfarer_throttled_total` (counter): throttle denials by route
//! - `wayfarer_socket_connections` (gauge): live WebSocket connections

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(address: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(address).install() {
        Ok(()) => tracing::info!(address = %address, "Metrics exporter listening"),
        Err(err) => tracing::error!(error = %err, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "wayfarer_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string(),
    )
    .increment(1);
    histogram!("wayfarer_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_cache(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!("wayfarer_cache_events_total", "outcome" => outcome).increment(1);
}

pub fn record_throttled(route: &str) {
    counter!("wayfarer_throttled_total", "route" => route.to_string()).increment(1);
}

pub fn socket_connected() {
    gauge!("wayfarer_socket_connections").increment(1.0);
}

pub fn socket_disconnected() {
    gauge!("wayfarer_socket_connections").decrement(1.0);
}
