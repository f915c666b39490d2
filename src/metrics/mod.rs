use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("rpc_request_duration_seconds".to_string()),
            EXPONENTIAL_SECONDS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("indexer_block_duration_seconds".to_string()),
            EXPONENTIAL_SECONDS,
        )?
        .install_recorder()
}

#[derive(Clone)]
pub struct Metrics {
    pub prometheus_handle: PrometheusHandle,
}

impl Metrics {
    pub fn new(prometheus_handle: PrometheusHandle) -> Self {
        Self { prometheus_handle }
    }

    pub fn render(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Records one dispatched RPC call. Unregistered methods share the `unknown` label.
pub fn record_rpc_request(method: &str, known: bool, duration: Duration, failed: bool) {
    let method = if known { method.to_string() } else { "unknown".to_string() };
    metrics::increment_counter!("rpc_requests_total", "method" => method.clone());
    if failed {
        metrics::increment_counter!("rpc_errors_total", "method" => method.clone());
    }
    metrics::histogram!("rpc_request_duration_seconds", duration.as_secs_f64(), "method" => method);
}

pub fn record_relay_submission(outcome: &'static str) {
    metrics::increment_counter!("relay_submissions_total", "outcome" => outcome);
}

/// Called once per committed height, including skipped ones.
pub fn record_block_indexed(height: u64, transactions: usize, duration: Duration) {
    metrics::increment_counter!("indexer_blocks_indexed_total");
    metrics::counter!("indexer_transactions_indexed_total", transactions as u64);
    metrics::gauge!("indexer_cursor_height", (height + 1) as f64);
    metrics::histogram!("indexer_block_duration_seconds", duration.as_secs_f64());
}

pub fn record_fetch_retry() {
    metrics::increment_counter!("indexer_fetch_retries_total");
}

pub fn record_persist_retry() {
    metrics::increment_counter!("indexer_persist_retries_total");
}
