//! HTTP API for churn prediction
//!
//! ## Endpoints
//!
//! - `GET /` - Status text (200 with a model, 500 without)
//! - `GET /health` - JSON health check, always 200
//! - `POST /predict` - Predict a class label from a JSON record
//!   (bodies over [`MAX_BODY_BYTES`] get a JSON 413)
//!
//! ## Example
//!
//! ```rust,ignore
//! use churn_serve::api::{create_router, AppState};
//!
//! let state = AppState::new(service);
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

mod handlers;
mod types;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub use types::{ErrorResponse, HealthResponse, PredictResponse};

use crate::service::PredictionService;

/// Largest accepted request body; bigger ones get a JSON 413
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    service: Arc<PredictionService>,
}

impl AppState {
    /// Wrap a service for sharing across handlers
    #[must_use]
    pub fn new(service: PredictionService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Underlying prediction service
    #[must_use]
    pub fn service(&self) -> &PredictionService {
        &self.service
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::status_handler))
        .route("/health", get(handlers::health_handler))
        .route("/predict", post(handlers::predict_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
