use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::job_store::JobCounts;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub jobs: JobCounts,
    pub geocode_cache_entries: usize,
}

/// GET /health — liveness plus a snapshot of in-memory state.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        jobs: state.jobs.counts(),
        geocode_cache_entries: state.geocoder.cache().len(),
    })
}
