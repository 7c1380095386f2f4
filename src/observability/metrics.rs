//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method, status
//! - `api_request_duration_seconds` (histogram): latency distribution
//! - `api_rate_limited_total` (counter): admission rejections
//! - `api_tracked_clients` (gauge): windows alive after a sweep
//! - `api_cache_lookups_total` (counter): identity cache lookups by outcome
//! - `api_auth_rejections_total` (counter): authentication failures by stage
//! - `api_authz_denials_total` (counter): authorization denials
//! - `api_version_conflicts_total` (counter): rejected conditional writes
//!
//! # Design Decisions
//! - Low-overhead metric updates (the `metrics` facade is a no-op until a
//!   recorder is installed)
//! - Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("api_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("api_rate_limited_total").increment(1);
}

pub fn record_tracked_clients(count: usize) {
    metrics::gauge!("api_tracked_clients").set(count as f64);
}

/// `outcome` is one of "hit", "miss", "error".
pub fn record_cache_lookup(outcome: &'static str) {
    metrics::counter!("api_cache_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_auth_rejection(stage: &'static str) {
    metrics::counter!("api_auth_rejections_total", "stage" => stage).increment(1);
}

pub fn record_authz_denial() {
    metrics::counter!("api_authz_denials_total").increment(1);
}

pub fn record_version_conflict() {
    metrics::counter!("api_version_conflicts_total").increment(1);
}
