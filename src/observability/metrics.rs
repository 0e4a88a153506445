//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shield_requests_total` (counter): requests by method, status
//! - `shield_request_duration_seconds` (histogram): latency distribution
//! - `shield_rate_limited_total` (counter): per-client rejections
//! - `shield_circuit_transitions_total` (counter): breaker opens/closes
//! - `shield_csrf_failures_total` (counter): rejected CSRF tokens
//! - `shield_rate_windows_evicted_total` (counter): LRU evictions
//! - `shield_tracked_clients` (gauge): fingerprints with a rate window
//! - `shield_swept_total` (counter): sessions/tokens removed by the sweeper
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests free of globals
//! - Prometheus exporter only starts from the binary

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!(
        "shield_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "shield_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("shield_rate_limited_total").increment(1);
}

pub fn record_circuit_transition(to: &'static str) {
    metrics::counter!("shield_circuit_transitions_total", "to" => to).increment(1);
}

pub fn record_csrf_failure() {
    metrics::counter!("shield_csrf_failures_total").increment(1);
}

pub fn record_evictions(count: usize) {
    metrics::counter!("shield_rate_windows_evicted_total").increment(count as u64);
}

pub fn record_tracked_clients(count: usize) {
    metrics::gauge!("shield_tracked_clients").set(count as f64);
}

pub fn record_sweep(sessions: usize, tokens: usize) {
    metrics::counter!("shield_swept_total", "kind" => "session").increment(sessions as u64);
    metrics::counter!("shield_swept_total", "kind" => "csrf_token").increment(tokens as u64);
}
