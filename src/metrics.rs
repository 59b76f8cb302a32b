//! Prometheus metrics for service fetches
//!
//! Metrics include:
//! - fetches per service and outcome
//! - fetch latency per service (histogram)
//! - normalized results per service
//! - token exchanges per service and status

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramOpts, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::time::Instant;
use tracing::error;

/// Fetch outcomes
pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_FETCH_ERROR: &str = "fetch_error";
pub const OUTCOME_PARSE_ERROR: &str = "parse_error";
pub const OUTCOME_NO_DATA: &str = "no_data";

// ============================================
// METRIC DEFINITIONS
// ============================================

static FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "aggregator_fetch_total",
        "Total number of service fetches by outcome",
        &["service", "outcome"]
    )
    .expect("Failed to create fetch_total metric")
});

static FETCH_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];
    register_histogram_vec!(
        HistogramOpts::new(
            "aggregator_fetch_latency_seconds",
            "End-to-end latency of a service fetch in seconds"
        )
        .buckets(buckets),
        &["service"]
    )
    .expect("Failed to create fetch_latency metric")
});

static RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "aggregator_results_total",
        "Total number of normalized results produced",
        &["service"]
    )
    .expect("Failed to create results metric")
});

static TOKEN_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "aggregator_token_requests_total",
        "Client-credentials token exchanges by status",
        &["service", "status"]
    )
    .expect("Failed to create token_requests metric")
});

// ============================================
// METRICS API
// ============================================

/// Records a completed fetch
pub fn record_fetch(service: &str, outcome: &str, results: usize) {
    FETCHES.with_label_values(&[service, outcome]).inc();
    RESULTS.with_label_values(&[service]).inc_by(results as u64);
}

/// Records fetch latency
pub fn record_fetch_latency(service: &str, latency_secs: f64) {
    FETCH_LATENCY.with_label_values(&[service]).observe(latency_secs);
}

/// Records a token exchange
pub fn record_token_request(service: &str, status: &str) {
    TOKEN_REQUESTS.with_label_values(&[service, status]).inc();
}

/// Collects all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

/// Records fetch latency for a service when dropped
pub struct FetchTimer {
    service: String,
    start: Instant,
}

impl FetchTimer {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for FetchTimer {
    fn drop(&mut self) {
        record_fetch_latency(&self.service, self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_metrics() {
        record_fetch("metrics-test", OUTCOME_SUCCESS, 3);
        record_token_request("metrics-test", "success");
        {
            let _timer = FetchTimer::new("metrics-test");
        }

        let metrics = gather_metrics();
        assert!(metrics.contains("aggregator_fetch_total"));
        assert!(metrics.contains("aggregator_results_total"));
        assert!(metrics.contains("aggregator_token_requests_total"));
        assert!(metrics.contains("aggregator_fetch_latency_seconds"));
    }
}
