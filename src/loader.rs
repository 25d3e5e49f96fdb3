//! Model artifact loading
//!
//! Reads the JSON artifact once at startup, validates it, and compares the
//! model against the configured feature schema. Drift between the two is
//! reported but not fatal: the server still starts, and the per-request
//! arity guard in [`crate::service`] catches what the warning announced.

use std::{fmt, path::Path, sync::Arc};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    model::{Classifier, ModelArtifact},
    schema::FeatureSchema,
};

/// Errors raised while loading a model artifact
#[derive(Debug, Error)]
pub enum LoadError {
    /// File missing or unreadable
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Artifact path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Not valid JSON, or an unknown `model_type`
    #[error("Parse error in {path}: {reason}")]
    Parse {
        /// Artifact path
        path: String,
        /// Parser message
        reason: String,
    },

    /// Structurally inconsistent model
    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

/// Load and validate a model artifact
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read, parsed, or fails the
/// integrity checks.
pub fn load_model(path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
    let path_str = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path_str.clone(),
        source,
    })?;

    let artifact = parse_artifact(&bytes).map_err(|e| match e {
        LoadError::Parse { reason, .. } => LoadError::Parse {
            path: path_str.clone(),
            reason,
        },
        other => other,
    })?;

    let model: Arc<dyn Classifier> = Arc::from(artifact.into_classifier());
    info!(
        path = %path_str,
        kind = %model.kind(),
        n_features = model.n_features(),
        "Model loaded"
    );
    Ok(model)
}

/// Parse and validate artifact bytes
///
/// # Errors
///
/// Returns [`LoadError::Parse`] (with an empty path) or
/// [`LoadError::Integrity`].
pub fn parse_artifact(bytes: &[u8]) -> Result<ModelArtifact, LoadError> {
    let artifact: ModelArtifact = serde_json::from_slice(bytes).map_err(|e| LoadError::Parse {
        path: String::new(),
        reason: e.to_string(),
    })?;
    artifact.validate()?;
    Ok(artifact)
}

/// Disagreement between the configured schema and the loaded model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDrift {
    /// Schema length differs from model arity
    Arity {
        /// Schema length
        schema: usize,
        /// Model arity
        model: usize,
    },
    /// Model recorded names that differ from the schema (name or order)
    Names {
        /// Schema order
        schema: Vec<String>,
        /// Model order
        model: Vec<String>,
    },
}

impl fmt::Display for SchemaDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaDrift::Arity { schema, model } => write!(
                f,
                "schema lists {schema} features but the model expects {model}"
            ),
            SchemaDrift::Names { schema, model } => write!(
                f,
                "feature names/order differ: model expects {model:?}, schema defines {schema:?}"
            ),
        }
    }
}

/// Compare a schema with the model it will feed
pub fn schema_drift(model: &dyn Classifier, schema: &FeatureSchema) -> Vec<SchemaDrift> {
    let mut drift = Vec::new();
    if model.n_features() != schema.len() {
        drift.push(SchemaDrift::Arity {
            schema: schema.len(),
            model: model.n_features(),
        });
    }
    if let Some(names) = model.feature_names() {
        if names != schema.names() {
            drift.push(SchemaDrift::Names {
                schema: schema.names().to_vec(),
                model: names.to_vec(),
            });
        }
    }
    drift
}

/// Log every drift finding at warn level, returning them for the caller
pub fn warn_on_drift(model: &dyn Classifier, schema: &FeatureSchema) -> Vec<SchemaDrift> {
    let drift = schema_drift(model, schema);
    for finding in &drift {
        warn!(%finding, "Feature schema does not match the loaded model");
    }
    drift
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn forest_json(n_features: usize, names: Option<Vec<&str>>) -> serde_json::Value {
        let mut value = json!({
            "model_type": "random_forest",
            "n_features_in": n_features,
            "classes": [0, 1],
            "trees": [{"nodes": [{"counts": [3.0, 1.0]}]}]
        });
        if let Some(names) = names {
            value["feature_names_in"] = json!(names);
        }
        value
    }

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("test");
        file.write_all(contents.as_bytes()).expect("test");
        file
    }

    #[test]
    fn test_load_model_from_file() {
        let file = write_temp(&forest_json(12, None).to_string());
        let model = load_model(file.path()).expect("test");
        assert_eq!(model.n_features(), 12);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_model(Path::new("/nonexistent/rf_model.json"))
            .err()
            .expect("missing file must fail");
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("rf_model.json"));
    }

    #[test]
    fn test_load_garbage_reports_path() {
        let file = write_temp("\u{80}not json");
        let err = load_model(file.path()).err().expect("garbage must fail");
        match err {
            LoadError::Parse { path, .. } => {
                assert_eq!(path, file.path().display().to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_model_type_is_parse_error() {
        let err = parse_artifact(br#"{"model_type": "svm"}"#).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn test_integrity_failure_surfaces() {
        let raw = json!({
            "model_type": "random_forest",
            "n_features_in": 2,
            "classes": [0, 1],
            "trees": []
        });
        let err = parse_artifact(raw.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Integrity(_)));
    }

    #[test]
    fn test_no_drift_for_matching_model() {
        let schema = FeatureSchema::churn();
        let names: Vec<&str> = schema.names().iter().map(String::as_str).collect();
        let artifact = parse_artifact(forest_json(12, Some(names)).to_string().as_bytes())
            .expect("test");
        let model = artifact.into_classifier();
        assert!(schema_drift(model.as_ref(), &schema).is_empty());
    }

    #[test]
    fn test_arity_drift_detected() {
        let schema = FeatureSchema::churn();
        let artifact = parse_artifact(forest_json(11, None).to_string().as_bytes()).expect("test");
        let model = artifact.into_classifier();

        let drift = warn_on_drift(model.as_ref(), &schema);
        assert_eq!(drift, vec![SchemaDrift::Arity { schema: 12, model: 11 }]);
        assert!(drift[0].to_string().contains("expects 11"));
    }

    #[test]
    fn test_name_order_drift_detected() {
        let schema = FeatureSchema::new(["a", "b"]).expect("test");
        let artifact =
            parse_artifact(forest_json(2, Some(vec!["b", "a"])).to_string().as_bytes())
                .expect("test");
        let model = artifact.into_classifier();

        let drift = schema_drift(model.as_ref(), &schema);
        assert_eq!(drift.len(), 1);
        assert!(matches!(drift[0], SchemaDrift::Names { .. }));
    }
}
