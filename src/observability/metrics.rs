//! Metrics collection and exposition.
//!
//! # Metrics
//! - `registry_requests_total` (counter): requests by method, status
//! - `registry_request_duration_seconds` (histogram): latency distribution
//! - `registry_plugins_loaded` (gauge): plugin instances after boot
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for method and status code
//! - Exporter runs its own listener, separate from the registry port

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on its own address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "failed to start metrics exporter"),
    }
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("registry_requests_total", &labels).increment(1);
    metrics::histogram!("registry_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}
