use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::models::analysis::ErrorResponse;
use crate::services::orchestrator::AnalysisError;

pub mod analysis;
pub mod health;
pub mod metrics;

/// JSON API routes. `/metrics` is mounted separately with its own state.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/models", get(analysis::list_models))
        .route("/start_analysis", post(analysis::start_analysis))
        .route("/get_progress/{analysis_id}", get(analysis::get_progress))
        .route("/get_results/{analysis_id}", get(analysis::get_results))
        .route("/get_location_details", post(analysis::get_location_details))
        .with_state(state)
}

/// Error returned by handlers, rendered as `{"success": false, "error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            success: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        if err.is_input_error() {
            ApiError::bad_request(err.to_string())
        } else {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}
