//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define relay metrics (jobs, upstream calls, queue depth, restarts)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `relay_gateway_requests_total` (counter): caller requests by status
//! - `relay_jobs_total` (counter): resolved jobs by outcome
//! - `relay_job_duration_seconds` (histogram): enqueue to resolution
//! - `relay_upstream_calls_total` (counter): outbound calls by result
//! - `relay_queue_depth` (gauge): jobs waiting for the dispatcher
//! - `relay_dispatcher_restarts_total` (counter): supervised worker restarts
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op, so tests need no setup

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_gateway_request(status: u16) {
    counter!("relay_gateway_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_job(outcome: &'static str, elapsed: Duration) {
    counter!("relay_jobs_total", "outcome" => outcome).increment(1);
    histogram!("relay_job_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_upstream_call(result: &'static str) {
    counter!("relay_upstream_calls_total", "result" => result).increment(1);
}

pub fn set_queue_depth(depth: u64) {
    gauge!("relay_queue_depth").set(depth as f64);
}

pub fn record_dispatcher_restart() {
    counter!("relay_dispatcher_restarts_total").increment(1);
}
