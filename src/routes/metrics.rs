//! Prometheus metrics endpoint
//!
//! Exposes proxy metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
///
/// If another recorder is already installed (tests, embedding), the handle still
/// renders, just without this process's series.
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Metrics recorder already installed");
    }
    handle
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "worker_proxy_requests_total",
        "Total number of /v1/responses calls, by final status and model alias"
    );
    metrics::describe_histogram!(
        "worker_proxy_request_duration_seconds",
        "Call duration in seconds, until the response or the stream's terminal event"
    );
    metrics::describe_counter!(
        "worker_proxy_upstream_requests_total",
        "Upstream requests by alias, dialect and outcome"
    );
    metrics::describe_counter!(
        "worker_proxy_upstream_retries_total",
        "Upstream requests retried after a connection failure"
    );
    metrics::describe_counter!(
        "worker_proxy_stream_events_total",
        "Normalized stream events sent to callers"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a finished call
pub fn record_request(status: &str, model: &str, duration_secs: f64) {
    metrics::counter!("worker_proxy_requests_total", "status" => status.to_string(), "model" => model.to_string())
        .increment(1);
    metrics::histogram!("worker_proxy_request_duration_seconds", "model" => model.to_string())
        .record(duration_secs);
}

/// Record one upstream request and its outcome (`ok` or an error kind)
pub fn record_upstream_request(alias: &str, dialect: &str, outcome: &str) {
    metrics::counter!(
        "worker_proxy_upstream_requests_total",
        "alias" => alias.to_string(),
        "dialect" => dialect.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_upstream_retry(alias: &str) {
    metrics::counter!("worker_proxy_upstream_retries_total", "alias" => alias.to_string())
        .increment(1);
}

pub fn record_stream_events(alias: &str, count: u64) {
    metrics::counter!("worker_proxy_stream_events_total", "alias" => alias.to_string())
        .increment(count);
}
