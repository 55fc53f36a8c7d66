//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mockserver_requests_total` (counter): requests by method, tier, status
//! - `mockserver_request_duration_seconds` (histogram): latency by tier
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(method: &str, tier: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "mockserver_requests_total",
        "method" => method.to_string(),
        "tier" => tier,
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!("mockserver_request_duration_seconds", "tier" => tier)
        .record(start.elapsed().as_secs_f64());
}
