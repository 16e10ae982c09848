use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — Prometheus text exposition of job and geocoding metrics.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}

/// Register descriptions for every metric the service records.
pub fn describe_metrics() {
    metrics::describe_counter!("analysis_jobs_total", "Total analysis jobs submitted");
    metrics::describe_counter!("analysis_jobs_completed", "Total analysis jobs completed");
    metrics::describe_counter!("analysis_jobs_failed", "Total analysis jobs that failed");
    metrics::describe_counter!(
        "predictor_iterations_failed",
        "Predictor invocations that failed and were skipped"
    );
    metrics::describe_gauge!("analysis_jobs_active", "Analysis jobs currently running");
    metrics::describe_histogram!(
        "analysis_processing_seconds",
        "Time to run one analysis job"
    );
    metrics::describe_counter!("geocode_cache_hits", "Reverse-geocoding cache hits");
    metrics::describe_counter!("geocode_cache_misses", "Reverse-geocoding cache misses");
    metrics::describe_counter!(
        "geocode_fallbacks",
        "Lookups that exhausted every provider and returned a placeholder"
    );
}
