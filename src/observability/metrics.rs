//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define core metrics (route resolutions, cache hits, lock waits)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `junction_route_resolutions_total` (counter): resolutions by outcome
//! - `junction_cache_requests_total` (counter): gets by backend and result
//! - `junction_locks_acquired_total` (counter): successful acquisitions
//! - `junction_lock_wait_seconds` (histogram): time spent waiting
//! - `junction_lock_timeouts_total` (counter): acquisition timeouts
//!
//! # Design Decisions
//! - Low-overhead updates through the `metrics` facade; a process without
//!   an installed recorder pays almost nothing
//! - Components record, the binary decides whether to expose

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::routing::{Resolved, RouteError};

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_route_resolution(result: &Result<Resolved, RouteError>) {
    let outcome = match result {
        Ok(_) => "matched",
        Err(RouteError::NotFound { .. }) => "not_found",
        Err(RouteError::MethodNotAllowed { .. }) => "method_not_allowed",
        Err(RouteError::InvalidPattern { .. }) => "invalid_pattern",
        Err(RouteError::NoRouteForTarget { .. }) => "no_route_for_target",
    };
    counter!("junction_route_resolutions_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_get(backend: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("junction_cache_requests_total", "backend" => backend, "result" => result)
        .increment(1);
}

pub fn record_lock_acquired(wait: Duration) {
    counter!("junction_locks_acquired_total").increment(1);
    histogram!("junction_lock_wait_seconds").record(wait.as_secs_f64());
}

pub fn record_lock_timeout() {
    counter!("junction_lock_timeouts_total").increment(1);
}
