//! Prometheus metrics exposition
//!
//! - `origin_challenges_issued_total` (counter): label `token_type`
//! - `origin_redemptions_total` (counter): label `outcome`
//! - `origin_resource_errors_total` (counter)

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

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

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

pub fn record_challenge(token_type: &str) {
    metrics::counter!("origin_challenges_issued_total", "token_type" => token_type.to_string())
        .increment(1);
}

pub fn record_redemption(outcome: &str) {
    metrics::counter!("origin_redemptions_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_resource_error() {
    metrics::counter!("origin_resource_errors_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_challenge("basic");
        record_redemption("granted");
        record_resource_error();
    }

    #[test]
    fn counters_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_challenge("rate_limited");
        record_challenge("basic");
        record_redemption("granted");
        record_redemption("unknown_challenge");
        record_resource_error();

        let output = handle.render();
        assert!(output.contains("origin_challenges_issued_total"));
        assert!(output.contains("token_type=\"rate_limited\""));
        assert!(output.contains("outcome=\"unknown_challenge\""));
        assert!(output.contains("origin_resource_errors_total"));
    }
}
