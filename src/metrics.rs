//! Prometheus metrics for tool calls and upstream traffic.
//!
//! This module provides metrics for:
//! - Tool invocations and the errors they render
//! - Upstream requests and their latency, per API
//! - Fallbacks from the primary to the secondary API

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, info};

use crate::error::AppError;
use crate::market::ApiSource;

// === Metric Name Constants ===

/// Tool invocations counter metric name.
pub const METRIC_TOOL_CALLS: &str = "tool_calls_total";
/// Tool invocations that rendered an error counter metric name.
pub const METRIC_TOOL_ERRORS: &str = "tool_errors_total";
/// Upstream requests counter metric name.
pub const METRIC_UPSTREAM_REQUESTS: &str = "upstream_requests_total";
/// Fallbacks to the secondary API counter metric name.
pub const METRIC_UPSTREAM_FALLBACKS: &str = "upstream_fallbacks_total";
/// Upstream request latency metric name.
pub const METRIC_UPSTREAM_LATENCY: &str = "upstream_request_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(METRIC_TOOL_CALLS, "Total number of tool invocations");
    describe_counter!(
        METRIC_TOOL_ERRORS,
        "Total number of tool invocations answered with an error message"
    );
    describe_counter!(
        METRIC_UPSTREAM_REQUESTS,
        "Total number of requests sent to upstream APIs"
    );
    describe_counter!(
        METRIC_UPSTREAM_FALLBACKS,
        "Total number of lookups retried against the fallback API"
    );
    describe_histogram!(
        METRIC_UPSTREAM_LATENCY,
        "Upstream request latency in milliseconds"
    );

    debug!("Metrics initialized");
}

/// Serve metrics for Prometheus scraping on `port`.
pub fn install_exporter(port: u16) -> Result<(), AppError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::Metrics(e.to_string()))?;
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Increment tool invocation counter.
pub fn inc_tool_calls(tool: &str) {
    counter!(METRIC_TOOL_CALLS, "tool" => tool.to_string()).increment(1);
}

/// Increment tool error counter.
pub fn inc_tool_errors(tool: &str) {
    counter!(METRIC_TOOL_ERRORS, "tool" => tool.to_string()).increment(1);
}

/// Increment upstream request counter.
pub fn inc_upstream_requests(api: ApiSource) {
    counter!(METRIC_UPSTREAM_REQUESTS, "api" => api.to_string()).increment(1);
}

/// Increment fallback counter.
pub fn inc_fallbacks() {
    counter!(METRIC_UPSTREAM_FALLBACKS).increment(1);
}

/// RAII guard for timing upstream requests.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    api: ApiSource,
}

impl LatencyTimer {
    /// Start timing a request to `api`.
    pub fn upstream(api: ApiSource) -> Self {
        Self {
            start: Instant::now(),
            api,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.elapsed_ms();
        histogram!(METRIC_UPSTREAM_LATENCY, "api" => self.api.to_string()).record(latency_ms);
    }
}
