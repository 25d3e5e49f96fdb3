//! Route handlers
//!
//! Handlers stay thin: the body is passed to the service as raw bytes so
//! malformed JSON is reported with the service's own message rather than an
//! extractor rejection.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::{
    types::{ErrorResponse, HealthResponse, PredictResponse},
    AppState, MAX_BODY_BYTES,
};
use crate::service::ServiceError;

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::from(&self))).into_response()
    }
}

/// Status text for liveness probes (`GET /`)
pub(crate) async fn status_handler(State(state): State<AppState>) -> (StatusCode, String) {
    let status = state.service().status();
    let code = if status.model_loaded {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, status.to_string())
}

/// JSON health check (`GET /health`)
pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.service().status();
    Json(HealthResponse {
        status: if status.model_loaded { "healthy" } else { "degraded" }.to_string(),
        version: crate::VERSION.to_string(),
        model_loaded: status.model_loaded,
        n_features: status.n_features,
    })
}

/// Prediction handler (`POST /predict`)
pub(crate) async fn predict_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<PredictResponse>, ServiceError> {
    let body = body.map_err(|rejection| state.service().reject_body(body_error(&rejection)))?;
    let prediction = state.service().predict(&body)?;
    Ok(Json(PredictResponse { prediction }))
}

fn body_error(rejection: &BytesRejection) -> ServiceError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge {
            limit: MAX_BODY_BYTES,
        }
    } else {
        ServiceError::InvalidJson {
            reason: rejection.body_text(),
        }
    }
}
