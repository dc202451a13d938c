//! Metrics and observability utilities
//!
//! Prometheus-style metrics for the chat pipeline. Recording is a no-op
//! until a recorder is installed (the gateway installs one).

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Portfolio Assistant metrics
pub const METRICS_PREFIX: &str = "portfolio";

/// Histogram buckets for upstream latency (in seconds), up to the 30s
/// completion timeout
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    15.00, // search timeout
    30.00, // completion timeout
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries by outcome"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search query latency in seconds"
    );

    describe_histogram!(
        format!("{}_search_results", METRICS_PREFIX),
        Unit::Count,
        "Number of candidates returned per search"
    );

    describe_histogram!(
        format!("{}_context_chars", METRICS_PREFIX),
        Unit::Count,
        "Characters of retrieval context sent to the model"
    );

    describe_counter!(
        format!("{}_completions_total", METRICS_PREFIX),
        Unit::Count,
        "Total completion calls by outcome"
    );

    describe_histogram!(
        format!("{}_completion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Completion call latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one search call; `outcome` is hits, empty or unavailable
pub fn record_search(duration_secs: f64, outcome: &str, result_count: usize) {
    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_search_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    histogram!(format!("{}_search_results", METRICS_PREFIX)).record(result_count as f64);
}

/// Record the size of an assembled context
pub fn record_context(chars: usize, citations: usize) {
    histogram!(
        format!("{}_context_chars", METRICS_PREFIX),
        "cited" => (citations > 0).to_string()
    )
    .record(chars as f64);
}

/// Record one completion call; `outcome` is reply, passthrough or error
pub fn record_completion(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_completions_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_completion_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}
