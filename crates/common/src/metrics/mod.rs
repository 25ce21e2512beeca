//! Metrics and observability utilities
//!
//! Counters and histograms are emitted through the `metrics` facade; the
//! gateway installs a Prometheus recorder when a metrics port is configured.
//! Without a recorder every call here is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::{Duration, Instant};

/// Metrics prefix for all MedRAG metrics
pub const METRICS_PREFIX: &str = "medrag";

/// Histogram buckets for answer latency (in seconds), dominated by the LLM call
pub const ANSWER_BUCKETS: &[f64] = &[
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 60s
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

    // Ingestion
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total documents ingested"
    );

    describe_counter!(
        format!("{}_chunks_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks embedded and stored"
    );

    describe_counter!(
        format!("{}_pages_scraped_total", METRICS_PREFIX),
        Unit::Count,
        "Pages fetched by the scraper, labelled by outcome"
    );

    // Query path
    describe_counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Successful retrievals"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embed plus index query latency in seconds"
    );

    describe_counter!(
        format!("{}_retrieval_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Retrievals that failed and continued with no context"
    );

    describe_counter!(
        format!("{}_generation_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Answer generation failures"
    );

    describe_histogram!(
        format!("{}_answer_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end answer latency in seconds"
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

pub fn record_retrieval(returned: usize, elapsed: Duration) {
    counter!(
        format!("{}_retrievals_total", METRICS_PREFIX),
        "empty" => (returned == 0).to_string()
    )
    .increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX))
        .record(elapsed.as_secs_f64());
}

pub fn record_retrieval_fallback() {
    counter!(format!("{}_retrieval_fallbacks_total", METRICS_PREFIX)).increment(1);
}

pub fn record_generation_failure(model: &str) {
    counter!(
        format!("{}_generation_failures_total", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .increment(1);
}

pub fn record_answer(elapsed: Duration, success: bool) {
    let status = if success { "success" } else { "error" };
    histogram!(
        format!("{}_answer_duration_seconds", METRICS_PREFIX),
        "status" => status
    )
    .record(elapsed.as_secs_f64());
}

/// Helper to record ingestion metrics
pub fn record_ingestion(documents: usize, chunks: usize) {
    counter!(format!("{}_documents_ingested_total", METRICS_PREFIX)).increment(documents as u64);
    counter!(format!("{}_chunks_ingested_total", METRICS_PREFIX)).increment(chunks as u64);
}

pub fn record_scrape(success: bool) {
    let outcome = if success { "ok" } else { "skipped" };
    counter!(
        format!("{}_pages_scraped_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}
