//! Classifier abstraction and the tabular models behind it
//!
//! The service only sees [`Classifier`]: expected arity, optional trained
//! name list, and a deterministic `predict`. Two concrete models are read
//! from the JSON artifact:
//!
//! - `random_forest`: averaged per-tree class probabilities, argmax
//! - `logistic_regression`: one coefficient row (binary) or one per class
//!
//! Raw JSON values are coerced to `f64` here, at the model boundary.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{features::FeatureVector, loader::LoadError};

/// Failures raised by a prediction call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    /// A value could not be used as a number
    #[error("feature '{feature}': {reason}")]
    IncompatibleValue {
        /// Offending feature
        feature: String,
        /// What was wrong with the value
        reason: String,
    },

    /// Names or order differ from those the model was trained with
    #[error("feature names mismatch: expected {expected:?}, received {received:?}")]
    FeatureMismatch {
        /// Trained order
        expected: Vec<String>,
        /// Order actually passed
        received: Vec<String>,
    },

    /// Vector length differs from model arity
    #[error("model expects {expected} features, received {received}")]
    ArityMismatch {
        /// Model arity
        expected: usize,
        /// Vector length
        received: usize,
    },

    /// Anything else, not caused by the caller
    #[error("internal model failure: {0}")]
    Internal(String),
}

/// Model family, for logs and status output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Tree ensemble
    RandomForest,
    /// Linear model with logistic link
    LogisticRegression,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::RandomForest => write!(f, "RandomForest"),
            ModelKind::LogisticRegression => write!(f, "LogisticRegression"),
        }
    }
}

/// A loaded classification model, shared read-only across requests
pub trait Classifier: Send + Sync {
    /// Model family
    fn kind(&self) -> ModelKind;

    /// Number of input features the model consumes
    fn n_features(&self) -> usize;

    /// Names the model was trained with, if recorded
    fn feature_names(&self) -> Option<&[String]>;

    /// Predict a class label for one vector
    ///
    /// # Errors
    ///
    /// Returns a [`PredictError`] describing why the vector was rejected.
    fn predict(&self, features: &FeatureVector) -> Result<i64, PredictError>;
}

/// Coerce raw values into numbers
///
/// Numbers pass, numeric strings are parsed, booleans map to 1/0. Nulls,
/// arrays, objects and other strings are rejected.
///
/// # Errors
///
/// Returns [`PredictError::IncompatibleValue`] for the first unusable value.
pub fn coerce(features: &FeatureVector) -> Result<Vec<f64>, PredictError> {
    features
        .iter()
        .map(|(name, value)| {
            coerce_value(value).map_err(|reason| PredictError::IncompatibleValue {
                feature: name.to_string(),
                reason,
            })
        })
        .collect()
}

fn coerce_value(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("number {n} is not representable as f64")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| format!("could not convert string to float: '{s}'")),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Err("value is null (missing values are not supported)".to_string()),
        Value::Array(_) => Err("expected a scalar, got an array".to_string()),
        Value::Object(_) => Err("expected a scalar, got an object".to_string()),
    }
}

/// Shared arity and name checks run before any arithmetic
fn check_input(
    n_features: usize,
    trained_names: Option<&[String]>,
    features: &FeatureVector,
) -> Result<(), PredictError> {
    if features.len() != n_features {
        return Err(PredictError::ArityMismatch {
            expected: n_features,
            received: features.len(),
        });
    }
    if let Some(expected) = trained_names {
        if expected != features.names() {
            return Err(PredictError::FeatureMismatch {
                expected: expected.to_vec(),
                received: features.names().to_vec(),
            });
        }
    }
    Ok(())
}

/// Index of the first maximum, matching numpy's argmax tie-breaking
fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = i;
        }
    }
    best
}

// ============================================================================
// Random forest
// ============================================================================

/// One node of a fitted decision tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    /// Internal node: `x[feature] <= threshold` goes left
    Split {
        /// Feature index
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
    },
    /// Leaf with per-class sample counts (or weights)
    Leaf {
        /// One entry per class
        counts: Vec<f64>,
    },
}

/// Fitted decision tree in flat node layout, root at index 0
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    /// Nodes, children always after their parent
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Walk to a leaf and return its normalized class distribution
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, PredictError> {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = x.get(*feature).copied().ok_or_else(|| {
                        PredictError::Internal(format!("split on absent feature index {feature}"))
                    })?;
                    idx = if value <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { counts }) => {
                    let total: f64 = counts.iter().sum();
                    return Ok(counts.iter().map(|c| c / total).collect());
                }
                None => {
                    return Err(PredictError::Internal(format!(
                        "tree node index {idx} out of range"
                    )))
                }
            }
        }
    }

    fn validate(&self, tree_idx: usize, n_features: usize, n_classes: usize) -> Result<(), LoadError> {
        let integrity = |reason: String| LoadError::Integrity(format!("tree {tree_idx}: {reason}"));

        if self.nodes.is_empty() {
            return Err(integrity("no nodes".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(integrity(format!(
                            "node {idx} splits on feature {feature}, model has {n_features}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(integrity(format!("node {idx} has a non-finite threshold")));
                    }
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(integrity(format!(
                                "node {idx} has invalid child index {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { counts } => {
                    if counts.len() != n_classes {
                        return Err(integrity(format!(
                            "leaf {idx} has {} counts, model has {n_classes} classes",
                            counts.len()
                        )));
                    }
                    if counts.iter().any(|c| !c.is_finite() || *c < 0.0)
                        || counts.iter().sum::<f64>() <= 0.0
                    {
                        return Err(integrity(format!("leaf {idx} has invalid counts")));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Tree ensemble classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    /// Input arity
    pub n_features_in: usize,
    /// Trained feature order, if recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names_in: Option<Vec<String>>,
    /// Class labels, indexed by leaf count position
    pub classes: Vec<i64>,
    /// Member trees
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Mean class distribution across all trees
    ///
    /// # Errors
    ///
    /// Propagates coercion, arity and name errors.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, PredictError> {
        check_input(self.n_features_in, self.feature_names_in.as_deref(), features)?;
        let x = coerce(features)?;

        let mut mean = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in mean.iter_mut().zip(tree.predict_proba(&x)?) {
                *acc += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        mean.iter_mut().for_each(|p| *p /= n_trees);
        Ok(mean)
    }

    pub(crate) fn validate(&self) -> Result<(), LoadError> {
        validate_common(self.n_features_in, self.feature_names_in.as_deref(), &self.classes)?;
        if self.trees.is_empty() {
            return Err(LoadError::Integrity("random forest has no trees".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, self.n_features_in, self.classes.len())?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn n_features(&self) -> usize {
        self.n_features_in
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names_in.as_deref()
    }

    fn predict(&self, features: &FeatureVector) -> Result<i64, PredictError> {
        let proba = self.predict_proba(features)?;
        Ok(self.classes[argmax(&proba)])
    }
}

// ============================================================================
// Logistic regression
// ============================================================================

/// Linear classifier; binary models carry a single coefficient row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticRegression {
    /// Input arity
    pub n_features_in: usize,
    /// Trained feature order, if recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names_in: Option<Vec<String>>,
    /// Class labels
    pub classes: Vec<i64>,
    /// Coefficient rows, each of length `n_features_in`
    pub coef: Vec<Vec<f64>>,
    /// One intercept per coefficient row
    pub intercept: Vec<f64>,
}

impl LogisticRegression {
    /// Raw linear scores, one per coefficient row
    ///
    /// # Errors
    ///
    /// Propagates coercion, arity and name errors.
    pub fn decision_function(&self, features: &FeatureVector) -> Result<Vec<f64>, PredictError> {
        check_input(self.n_features_in, self.feature_names_in.as_deref(), features)?;
        let x = coerce(features)?;

        Ok(self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| row.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect())
    }

    pub(crate) fn validate(&self) -> Result<(), LoadError> {
        validate_common(self.n_features_in, self.feature_names_in.as_deref(), &self.classes)?;

        let expected_rows = if self.classes.len() == 2 { 1 } else { self.classes.len() };
        if self.coef.len() != expected_rows || self.intercept.len() != expected_rows {
            return Err(LoadError::Integrity(format!(
                "logistic regression with {} classes needs {expected_rows} coefficient rows and intercepts, got {} and {}",
                self.classes.len(),
                self.coef.len(),
                self.intercept.len()
            )));
        }
        if let Some(row) = self.coef.iter().find(|row| row.len() != self.n_features_in) {
            return Err(LoadError::Integrity(format!(
                "coefficient row has {} entries, model has {} features",
                row.len(),
                self.n_features_in
            )));
        }
        Ok(())
    }
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> ModelKind {
        ModelKind::LogisticRegression
    }

    fn n_features(&self) -> usize {
        self.n_features_in
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names_in.as_deref()
    }

    fn predict(&self, features: &FeatureVector) -> Result<i64, PredictError> {
        let scores = self.decision_function(features)?;
        let idx = if scores.len() == 1 {
            usize::from(scores[0] > 0.0)
        } else {
            argmax(&scores)
        };
        Ok(self.classes[idx])
    }
}

fn validate_common(
    n_features: usize,
    names: Option<&[String]>,
    classes: &[i64],
) -> Result<(), LoadError> {
    if n_features == 0 {
        return Err(LoadError::Integrity("model declares zero input features".to_string()));
    }
    if classes.len() < 2 {
        return Err(LoadError::Integrity(format!(
            "classifier needs at least 2 classes, got {}",
            classes.len()
        )));
    }
    if let Some(names) = names {
        if names.len() != n_features {
            return Err(LoadError::Integrity(format!(
                "feature_names_in has {} entries, n_features_in is {n_features}",
                names.len()
            )));
        }
    }
    Ok(())
}

/// Serialized model artifact, tagged by `model_type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Tree ensemble
    RandomForest(RandomForest),
    /// Logistic regression
    LogisticRegression(LogisticRegression),
}

impl ModelArtifact {
    /// Check structural integrity so `predict` cannot index out of range
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Integrity`] describing the first defect.
    pub fn validate(&self) -> Result<(), LoadError> {
        match self {
            ModelArtifact::RandomForest(m) => m.validate(),
            ModelArtifact::LogisticRegression(m) => m.validate(),
        }
    }

    /// Unwrap into a shareable classifier
    #[must_use]
    pub fn into_classifier(self) -> Box<dyn Classifier> {
        match self {
            ModelArtifact::RandomForest(m) => Box::new(m),
            ModelArtifact::LogisticRegression(m) => Box::new(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{features, schema::FeatureSchema};
    use serde_json::json;

    fn vector(value: Value, names: &[&str]) -> FeatureVector {
        let schema = FeatureSchema::new(names.iter().copied()).expect("test");
        let Value::Object(record) = value else {
            panic!("test record must be an object");
        };
        features::build(&record, &schema).expect("test")
    }

    /// Stump on feature 0 at 5.0: left votes class 0, right votes class 1
    fn stump_forest(names: Option<Vec<String>>) -> RandomForest {
        RandomForest {
            n_features_in: 2,
            feature_names_in: names,
            classes: vec![0, 1],
            trees: vec![DecisionTree {
                nodes: vec![
                    TreeNode::Split {
                        feature: 0,
                        threshold: 5.0,
                        left: 1,
                        right: 2,
                    },
                    TreeNode::Leaf {
                        counts: vec![9.0, 1.0],
                    },
                    TreeNode::Leaf {
                        counts: vec![2.0, 8.0],
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_forest_predicts_by_threshold() {
        let forest = stump_forest(None);
        let low = vector(json!({"x": 3.0, "y": 0}), &["x", "y"]);
        let high = vector(json!({"x": 7.5, "y": 0}), &["x", "y"]);
        let edge = vector(json!({"x": 5.0, "y": 0}), &["x", "y"]);

        assert_eq!(forest.predict(&low), Ok(0));
        assert_eq!(forest.predict(&high), Ok(1));
        assert_eq!(forest.predict(&edge), Ok(0));
    }

    #[test]
    fn test_forest_averages_trees() {
        let mut forest = stump_forest(None);
        // Second tree always votes strongly for class 1
        forest.trees.push(DecisionTree {
            nodes: vec![TreeNode::Leaf {
                counts: vec![0.0, 10.0],
            }],
        });
        let low = vector(json!({"x": 3.0, "y": 0}), &["x", "y"]);

        let proba = forest.predict_proba(&low).expect("test");
        assert!((proba[0] - 0.45).abs() < 1e-9);
        assert!((proba[1] - 0.55).abs() < 1e-9);
        assert_eq!(forest.predict(&low), Ok(1));
    }

    #[test]
    fn test_numeric_strings_and_bools_coerce() {
        let forest = stump_forest(None);
        let v = vector(json!({"x": " 7.5 ", "y": true}), &["x", "y"]);
        assert_eq!(coerce(&v), Ok(vec![7.5, 1.0]));
        assert_eq!(forest.predict(&v), Ok(1));
    }

    #[test]
    fn test_non_numeric_string_rejected() {
        let forest = stump_forest(None);
        let v = vector(json!({"x": "abc", "y": 1}), &["x", "y"]);
        match forest.predict(&v) {
            Err(PredictError::IncompatibleValue { feature, reason }) => {
                assert_eq!(feature, "x");
                assert!(reason.contains("abc"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_null_and_containers_rejected() {
        for bad in [Value::Null, json!([1.0]), json!({"v": 1.0})] {
            let v = vector(json!({"x": 1.0, "y": bad}), &["x", "y"]);
            assert!(matches!(
                coerce(&v),
                Err(PredictError::IncompatibleValue { ref feature, .. }) if feature == "y"
            ));
        }
    }

    #[test]
    fn test_trained_names_mismatch() {
        let forest = stump_forest(Some(vec!["x".to_string(), "y".to_string()]));
        let swapped = vector(json!({"x": 1, "y": 2}), &["y", "x"]);
        match forest.predict(&swapped) {
            Err(PredictError::FeatureMismatch { expected, received }) => {
                assert_eq!(expected, ["x", "y"]);
                assert_eq!(received, ["y", "x"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_arity_mismatch() {
        let forest = stump_forest(None);
        let short = vector(json!({"x": 1}), &["x"]);
        assert_eq!(
            forest.predict(&short),
            Err(PredictError::ArityMismatch {
                expected: 2,
                received: 1
            })
        );
    }

    #[test]
    fn test_logistic_binary() {
        let model = LogisticRegression {
            n_features_in: 2,
            feature_names_in: None,
            classes: vec![0, 1],
            coef: vec![vec![1.0, -1.0]],
            intercept: vec![0.0],
        };
        let pos = vector(json!({"a": 3, "b": 1}), &["a", "b"]);
        let neg = vector(json!({"a": 1, "b": 3}), &["a", "b"]);
        assert_eq!(model.predict(&pos), Ok(1));
        assert_eq!(model.predict(&neg), Ok(0));
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_logistic_multiclass_argmax() {
        let model = LogisticRegression {
            n_features_in: 1,
            feature_names_in: None,
            classes: vec![10, 20, 30],
            coef: vec![vec![0.0], vec![1.0], vec![-1.0]],
            intercept: vec![0.5, 0.0, 0.0],
        };
        let v = vector(json!({"a": 2}), &["a"]);
        assert_eq!(model.predict(&v), Ok(20));
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let mut forest = stump_forest(None);
        forest.trees[0].nodes[0] = TreeNode::Split {
            feature: 0,
            threshold: 1.0,
            left: 0,
            right: 2,
        };
        let err = forest.validate().unwrap_err();
        assert!(err.to_string().contains("invalid child index"));
    }

    #[test]
    fn test_validate_rejects_feature_out_of_range() {
        let mut forest = stump_forest(None);
        forest.trees[0].nodes[0] = TreeNode::Split {
            feature: 2,
            threshold: 1.0,
            left: 1,
            right: 2,
        };
        assert!(forest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_leaf_class_count() {
        let mut forest = stump_forest(None);
        forest.trees[0].nodes[1] = TreeNode::Leaf {
            counts: vec![1.0, 1.0, 1.0],
        };
        assert!(forest.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_logistic_shape() {
        let model = LogisticRegression {
            n_features_in: 3,
            feature_names_in: None,
            classes: vec![0, 1],
            coef: vec![vec![1.0, 2.0]],
            intercept: vec![0.0],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_name_count_mismatch() {
        let forest = stump_forest(Some(vec!["a".to_string()]));
        match forest.validate() {
            Err(LoadError::Integrity(msg)) => {
                assert!(msg.contains("feature_names_in has 1 entries"), "{msg}");
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_single_class() {
        let mut forest = stump_forest(None);
        forest.classes = vec![0];
        match forest.validate() {
            Err(LoadError::Integrity(msg)) => assert!(msg.contains("at least 2 classes"), "{msg}"),
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_negative_leaf_counts() {
        let mut forest = stump_forest(None);
        forest.trees[0].nodes[2] = TreeNode::Leaf {
            counts: vec![-1.0, 4.0],
        };
        match forest.validate() {
            Err(LoadError::Integrity(msg)) => {
                assert!(msg.contains("leaf 2 has invalid counts"), "{msg}");
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_sum_leaf() {
        let mut forest = stump_forest(None);
        forest.trees[0].nodes[1] = TreeNode::Leaf {
            counts: vec![0.0, 0.0],
        };
        match forest.validate() {
            Err(LoadError::Integrity(msg)) => {
                assert!(msg.contains("leaf 1 has invalid counts"), "{msg}");
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_multiclass_row_count() {
        let model = LogisticRegression {
            n_features_in: 1,
            feature_names_in: None,
            classes: vec![10, 20, 30],
            coef: vec![vec![0.0], vec![1.0]],
            intercept: vec![0.0, 0.0],
        };
        match model.validate() {
            Err(LoadError::Integrity(msg)) => {
                assert!(msg.contains("needs 3 coefficient rows"), "{msg}");
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_artifact_tagged_deserialization() {
        let raw = json!({
            "model_type": "random_forest",
            "n_features_in": 1,
            "classes": [0, 1],
            "trees": [{"nodes": [{"counts": [1.0, 3.0]}]}]
        });
        let artifact: ModelArtifact = serde_json::from_value(raw).expect("test");
        assert!(artifact.validate().is_ok());

        let model = artifact.into_classifier();
        assert_eq!(model.kind(), ModelKind::RandomForest);
        assert_eq!(model.n_features(), 1);
        assert!(model.feature_names().is_none());
    }

    #[test]
    fn test_argmax_prefers_first_on_tie() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }
}
