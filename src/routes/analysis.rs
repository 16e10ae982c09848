use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app_state::AppState;
use crate::models::analysis::{
    ErrorResponse, LocationDetailsRequest, LocationDetailsResponse, ProgressResponse,
    StartAnalysisRequest, StartAnalysisResponse,
};
use crate::models::location::GeoPoint;
use crate::routes::ApiError;
use crate::services::orchestrator::AnalysisOutcome;
use crate::services::predictor::{ModelInfo, MODELS};

/// POST /start_analysis — validate the image and parameters, then queue a
/// background analysis.
pub async fn start_analysis(
    State(state): State<AppState>,
    payload: Result<Json<StartAnalysisRequest>, JsonRejection>,
) -> Result<Json<StartAnalysisResponse>, ApiError> {
    let Json(request) = payload?;

    let analysis_id = state.orchestrator.start_analysis(request).map_err(|e| {
        tracing::warn!(error = %e, "Rejected analysis request");
        ApiError::from(e)
    })?;

    Ok(Json(StartAnalysisResponse {
        success: true,
        analysis_id,
    }))
}

/// GET /get_progress/{analysis_id}
pub async fn get_progress(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> Json<ProgressResponse> {
    Json(state.orchestrator.progress(&analysis_id))
}

/// GET /get_results/{analysis_id}
pub async fn get_results(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> Response {
    match state.orchestrator.results(&analysis_id) {
        AnalysisOutcome::Ready(results) => (StatusCode::OK, Json(results)).into_response(),
        AnalysisOutcome::Failed(error) => {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, error).into_response()
        }
        AnalysisOutcome::InProgress => (
            StatusCode::ACCEPTED,
            Json(ErrorResponse {
                success: false,
                error: "Analysis in progress".to_string(),
            }),
        )
            .into_response(),
        AnalysisOutcome::NotFound => {
            ApiError::new(StatusCode::NOT_FOUND, "Analysis not found").into_response()
        }
    }
}

/// POST /get_location_details — resolve a label for one listed result.
pub async fn get_location_details(
    State(state): State<AppState>,
    payload: Result<Json<LocationDetailsRequest>, JsonRejection>,
) -> Result<Json<LocationDetailsResponse>, ApiError> {
    let Json(request) = payload?;

    let (Some(lat), Some(lon)) = (request.lat, request.lon) else {
        return Err(ApiError::bad_request("lat and lon are required"));
    };
    let point = GeoPoint::new(lat, lon)
        .ok_or_else(|| ApiError::bad_request("Coordinates out of range"))?;

    let location_info = state.geocoder.resolve(point).await;

    Ok(Json(LocationDetailsResponse {
        success: true,
        location_info,
        result_index: request.result_index.unwrap_or(0),
    }))
}

/// GET /api/v1/models
pub async fn list_models() -> Json<&'static [ModelInfo]> {
    Json(MODELS)
}
