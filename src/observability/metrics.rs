//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): inbound requests by method, status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_cache_lookups_total` (counter): proxy cache hits and misses
//! - `proxy_cache_entries` (gauge): live proxy cache entries
//! - `proxy_token_fetches_total` (counter): OAuth token requests by outcome
//! - `proxy_forbidden_retries_total` (counter): 403 retries by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter runs its own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    ::metrics::counter!("proxy_requests_total", &labels).increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    ::metrics::counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    ::metrics::gauge!("proxy_cache_entries").set(entries as f64);
}

pub fn record_token_fetch(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::counter!("proxy_token_fetches_total", "outcome" => outcome).increment(1);
}

/// `outcome` is one of `success`, `forbidden`, `error`.
pub fn record_forbidden_retry(outcome: &'static str) {
    ::metrics::counter!("proxy_forbidden_retries_total", "outcome" => outcome).increment(1);
}
