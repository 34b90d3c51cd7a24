//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_upstream_errors_total` (counter): failed upstream calls by route, kind
//! - `gateway_rate_limited_total` (counter): requests rejected by a rate limiter
//! - `gateway_route_table_size` (gauge): routes in the published table
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users and
//!   tests pay nothing
//! - Requests that match no route are labeled `route="none"`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("gateway_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        );

    let builder = match builder {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to apply histogram buckets, using defaults");
            PrometheusBuilder::new().with_http_listener(addr)
        }
    };

    if let Err(e) = builder.install() {
        tracing::error!(error = %e, "Failed to install Prometheus exporter");
        return;
    }

    describe_counter!("gateway_requests_total", "Total requests handled by the gateway");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "Time from request arrival to response, in seconds"
    );
    describe_counter!("gateway_upstream_errors_total", "Failed upstream calls");
    describe_counter!("gateway_rate_limited_total", "Requests rejected by a rate limiter");
    describe_gauge!("gateway_route_table_size", "Routes in the published route table");

    tracing::info!(address = %addr, "Metrics endpoint listening");
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string()).record(duration);
}

/// Record a failed upstream call.
pub fn record_upstream_error(route: &str, kind: &'static str) {
    counter!(
        "gateway_upstream_errors_total",
        "route" => route.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn set_route_table_size(size: usize) {
    gauge!("gateway_route_table_size").set(size as f64);
}
