//! Prediction service: one request from raw body to class label
//!
//! Each stage returns a typed error and the stages run in a fixed order:
//!
//! 1. model availability (before any parsing)
//! 2. body parse into a JSON object
//! 3. vector build against the feature schema
//! 4. arity guard against the loaded model
//! 5. model prediction
//!
//! [`ServiceError::status_code`] picks the HTTP status per kind. Detail for
//! server-side failures is logged here and never placed in the caller's
//! message.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    features::{self, FeatureError, InputRecord},
    loader::{self, LoadError},
    model::{Classifier, ModelKind, PredictError},
    schema::FeatureSchema,
};

/// Caller-facing message when the model is absent
pub const MODEL_UNAVAILABLE_MSG: &str = "Model is not available, check the server log";
/// Caller-facing message for empty or undecodable bodies
pub const INVALID_JSON_MSG: &str = "missing/invalid JSON body.";
/// Caller-facing message for unexpected server failures
pub const INTERNAL_ERROR_MSG: &str = "internal server error";

/// Request failures, one variant per outcome the caller can observe
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// Model failed to load at startup
    #[error("{}", MODEL_UNAVAILABLE_MSG)]
    ModelUnavailable,

    /// Body empty, not JSON, or not a non-empty object
    #[error("{}", INVALID_JSON_MSG)]
    InvalidJson {
        /// Why decoding failed (logged only)
        reason: String,
    },

    /// Record lacks a schema feature
    #[error("input is missing required feature: '{name}'")]
    MissingFeature {
        /// First missing name in schema order
        name: String,
        /// Full required list
        required: Vec<String>,
    },

    /// Model rejected the feature names or their order
    #[error("prediction failed: feature mismatch (name or order differs)")]
    FeatureMismatch {
        /// Order the model was trained with
        expected: Vec<String>,
        /// Order that was sent
        received: Vec<String>,
    },

    /// Model rejected a value
    #[error("prediction failed: invalid or incompatible feature values - {detail}")]
    InvalidValues {
        /// Underlying value error
        detail: String,
    },

    /// Schema and model disagree on vector length
    #[error("internal error: feature count mismatch before prediction")]
    ArityMismatch {
        /// Model arity
        expected: usize,
        /// Built vector length
        received: usize,
    },

    /// Body larger than the configured limit
    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Limit in bytes
        limit: usize,
    },

    /// Unexpected failure inside the model
    #[error("{}", INTERNAL_ERROR_MSG)]
    Internal {
        /// Diagnostic (logged only)
        detail: String,
    },
}

impl ServiceError {
    /// HTTP status for this outcome
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidJson { .. }
            | ServiceError::MissingFeature { .. }
            | ServiceError::FeatureMismatch { .. }
            | ServiceError::InvalidValues { .. } => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::ModelUnavailable
            | ServiceError::ArityMismatch { .. }
            | ServiceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors the caller can fix by changing the request
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<FeatureError> for ServiceError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::MissingFeature { name, required } => {
                ServiceError::MissingFeature { name, required }
            }
        }
    }
}

impl From<PredictError> for ServiceError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::IncompatibleValue { .. } => ServiceError::InvalidValues {
                detail: err.to_string(),
            },
            PredictError::FeatureMismatch { expected, received } => {
                ServiceError::FeatureMismatch { expected, received }
            }
            PredictError::ArityMismatch { expected, received } => {
                ServiceError::ArityMismatch { expected, received }
            }
            PredictError::Internal(detail) => ServiceError::Internal { detail },
        }
    }
}

/// Read-only view used by liveness probes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Whether a model is loaded
    pub model_loaded: bool,
    /// Model family, when loaded
    pub model_kind: Option<ModelKind>,
    /// Expected feature count (model arity, or schema length without a model)
    pub n_features: usize,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.model_loaded {
            write!(
                f,
                "Prediction API is running and the model is loaded. Expecting {} features.",
                self.n_features
            )
        } else {
            write!(
                f,
                "Prediction API is running but the model could not be loaded. Check the server log."
            )
        }
    }
}

/// Model handle fixed at startup
#[derive(Clone)]
enum ModelState {
    Loaded(Arc<dyn Classifier>),
    Unavailable,
}

/// Request orchestration over one immutable model handle
#[derive(Clone)]
pub struct PredictionService {
    model: ModelState,
    schema: FeatureSchema,
}

impl fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionService")
            .field("status", &self.status())
            .field("schema", &self.schema)
            .finish()
    }
}

impl PredictionService {
    /// Service over a loaded model
    #[must_use]
    pub fn new(model: Arc<dyn Classifier>, schema: FeatureSchema) -> Self {
        Self {
            model: ModelState::Loaded(model),
            schema,
        }
    }

    /// Service with no model; every prediction reports unavailable
    #[must_use]
    pub fn unavailable(schema: FeatureSchema) -> Self {
        Self {
            model: ModelState::Unavailable,
            schema,
        }
    }

    /// Build from a startup load attempt
    ///
    /// A failed load is logged and degrades the service instead of aborting.
    /// A successful load is checked against the schema and drift is logged.
    #[must_use]
    pub fn from_load(result: Result<Arc<dyn Classifier>, LoadError>, schema: FeatureSchema) -> Self {
        match result {
            Ok(model) => {
                loader::warn_on_drift(model.as_ref(), &schema);
                Self::new(model, schema)
            }
            Err(e) => {
                error!(error = %e, "Model failed to load, serving in unavailable mode");
                Self::unavailable(schema)
            }
        }
    }

    /// Configured feature schema
    #[must_use]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// The loaded model, if any
    #[must_use]
    pub fn model(&self) -> Option<&Arc<dyn Classifier>> {
        match &self.model {
            ModelState::Loaded(model) => Some(model),
            ModelState::Unavailable => None,
        }
    }

    /// Whether predictions can be served
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.model().is_some()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ServiceStatus {
        match self.model() {
            Some(model) => ServiceStatus {
                model_loaded: true,
                model_kind: Some(model.kind()),
                n_features: model.n_features(),
            },
            None => ServiceStatus {
                model_loaded: false,
                model_kind: None,
                n_features: self.schema.len(),
            },
        }
    }

    /// Run the full pipeline on a raw request body
    ///
    /// # Errors
    ///
    /// Returns the [`ServiceError`] of the first failing stage.
    pub fn predict(&self, body: &[u8]) -> Result<i64, ServiceError> {
        let result = self.run(body);
        match &result {
            Ok(label) => info!(prediction = label, "Prediction succeeded"),
            Err(e) => log_failure(e),
        }
        result
    }

    /// Report a body that could not be read
    ///
    /// Model availability still takes precedence, as in [`Self::predict`].
    #[must_use]
    pub fn reject_body(&self, err: ServiceError) -> ServiceError {
        let err = if self.is_ready() {
            err
        } else {
            ServiceError::ModelUnavailable
        };
        log_failure(&err);
        err
    }

    fn run(&self, body: &[u8]) -> Result<i64, ServiceError> {
        let model = self.model().ok_or(ServiceError::ModelUnavailable)?;
        let record = parse_body(body)?;
        self.predict_with(model.as_ref(), &record)
    }

    /// Stages 3-5 for an already decoded record
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ModelUnavailable`] without a model, otherwise
    /// the error of the failing stage.
    pub fn predict_record(&self, record: &InputRecord) -> Result<i64, ServiceError> {
        let model = self.model().ok_or(ServiceError::ModelUnavailable)?;
        self.predict_with(model.as_ref(), record)
    }

    fn predict_with(&self, model: &dyn Classifier, record: &InputRecord) -> Result<i64, ServiceError> {
        debug!(keys = ?record.keys().collect::<Vec<_>>(), "Received input record");

        let vector = features::build(record, &self.schema)?;

        if vector.len() != model.n_features() {
            return Err(ServiceError::ArityMismatch {
                expected: model.n_features(),
                received: vector.len(),
            });
        }

        match panic::catch_unwind(AssertUnwindSafe(|| model.predict(&vector))) {
            Ok(result) => result.map_err(ServiceError::from),
            Err(payload) => Err(ServiceError::Internal {
                detail: format!("model panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }
}

/// Decode the body as a single, non-empty JSON object
fn parse_body(body: &[u8]) -> Result<InputRecord, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ServiceError::InvalidJson {
            reason: "empty request body".to_string(),
        });
    }

    let value: Value = serde_json::from_slice(body).map_err(|e| ServiceError::InvalidJson {
        reason: e.to_string(),
    })?;

    match value {
        Value::Object(map) if map.is_empty() => Err(ServiceError::InvalidJson {
            reason: "empty JSON object".to_string(),
        }),
        Value::Object(map) => Ok(map),
        other => Err(ServiceError::InvalidJson {
            reason: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn log_failure(err: &ServiceError) {
    match err {
        ServiceError::InvalidJson { reason } => warn!(%reason, "Rejected request body"),
        ServiceError::MissingFeature { name, .. } => warn!(feature = %name, "Missing required feature"),
        ServiceError::FeatureMismatch { expected, received } => {
            warn!(?expected, ?received, "Feature names/order rejected by model");
        }
        ServiceError::InvalidValues { detail } => warn!(%detail, "Feature values rejected by model"),
        ServiceError::PayloadTooLarge { limit } => warn!(limit, "Request body too large"),
        ServiceError::ModelUnavailable => error!("Prediction requested but no model is loaded"),
        ServiceError::ArityMismatch { expected, received } => error!(
            expected,
            received, "Feature count mismatch between schema and model"
        ),
        ServiceError::Internal { detail } => error!(%detail, "Unexpected failure during prediction"),
    }
}
