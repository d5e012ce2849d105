//! Prometheus metrics exposition
//!
//! - `attester_requests_total` (counter): labels `token_type`, `outcome`
//! - `attester_request_duration_seconds` (histogram): label `outcome`
//! - `attester_issuer_errors_total` (counter): label `error_type`

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "attester_request_duration_seconds";

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Counters reported by `/health`.
#[derive(Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(DURATION_METRIC.to_string()),
            DURATION_BUCKETS,
        )
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a finished token request.
pub fn record_request(token_type: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "attester_requests_total",
        "token_type" => token_type.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "outcome" => outcome.to_string()).record(duration_secs);
}

/// Record a failed forward to the Issuer.
pub fn record_issuer_error(error_type: &str) {
    metrics::counter!("attester_issuer_errors_total", "error_type" => error_type.to_string())
        .increment(1);
}
