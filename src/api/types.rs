//! Request/response bodies for the HTTP API

use serde::{Deserialize, Serialize};

use crate::service::ServiceError;

/// Successful prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Predicted class label
    pub prediction: i64,
}

/// Health check response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" with a model, "degraded" without
    pub status: String,
    /// Service version
    pub version: String,
    /// Whether a model is loaded
    pub model_loaded: bool,
    /// Expected feature count
    pub n_features: usize,
}

/// Error response
///
/// `error` is always present. The optional fields carry remediation context
/// for caller-correctable failures, and the counts for schema/model drift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Hint on how to fix the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Longer explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Every feature the payload must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_features: Option<Vec<String>>,
    /// Feature order the model was trained with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_features_order: Option<Vec<String>>,
    /// Feature order actually passed to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_features_order: Option<Vec<String>>,
    /// Model arity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_count: Option<usize>,
    /// Built vector length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_count: Option<usize>,
}

impl ErrorResponse {
    /// Response carrying only a message
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        let base = Self::new(err.to_string());
        match err {
            ServiceError::MissingFeature { required, .. } => Self {
                message: Some(
                    "Check that the JSON payload contains every key listed in required_features"
                        .to_string(),
                ),
                required_features: Some(required.clone()),
                ..base
            },
            ServiceError::FeatureMismatch { expected, received } => Self {
                details: Some(
                    "The configured feature schema must match the model's training data exactly, in name and order"
                        .to_string(),
                ),
                required_features_order: Some(expected.clone()),
                received_features_order: Some(received.clone()),
                ..base
            },
            ServiceError::ArityMismatch { expected, received } => Self {
                expected_count: Some(*expected),
                received_count: Some(*received),
                ..base
            },
            ServiceError::ModelUnavailable
            | ServiceError::InvalidJson { .. }
            | ServiceError::InvalidValues { .. }
            | ServiceError::PayloadTooLarge { .. }
            | ServiceError::Internal { .. } => base,
        }
    }
}
