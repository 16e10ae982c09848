use std::sync::Arc;

use crate::services::{
    geocoding::GeocodingResolver, job_store::JobStore, orchestrator::AnalysisOrchestrator,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub geocoder: Arc<GeocodingResolver>,
}

impl AppState {
    pub fn new(orchestrator: AnalysisOrchestrator, geocoder: GeocodingResolver) -> Self {
        Self {
            jobs: orchestrator.jobs().clone(),
            orchestrator: Arc::new(orchestrator),
            geocoder: Arc::new(geocoder),
        }
    }
}
