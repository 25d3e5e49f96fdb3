//! Request-to-vector adaptation
//!
//! Maps a loosely typed JSON object onto the ordered vector a model expects.
//! Values pass through untouched: numeric coercion happens inside the model
//! call, so a record holding `"abc"` builds fine here and fails later with a
//! value error.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::FeatureSchema;

/// Decoded request body: feature name to raw value, extra keys allowed
pub type InputRecord = Map<String, Value>;

/// Failure to build a vector from a record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// First schema name (in schema order) absent from the record
    #[error("input is missing required feature: '{name}'")]
    MissingFeature {
        /// Missing feature name
        name: String,
        /// Full required list, in schema order
        required: Vec<String>,
    },
}

/// Values aligned positionally to a schema
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<Value>,
}

impl FeatureVector {
    /// Names in the order the values were taken
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Raw, uncoerced values
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the vector holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(name, value)` pairs in vector order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Build the feature vector for `record` in `schema` order
///
/// Keys outside the schema are dropped. The whole record is checked for
/// missing names before any value is copied.
///
/// # Errors
///
/// Returns [`FeatureError::MissingFeature`] naming the first schema entry
/// the record lacks.
pub fn build(record: &InputRecord, schema: &FeatureSchema) -> Result<FeatureVector, FeatureError> {
    if let Some(missing) = schema.names().iter().find(|name| !record.contains_key(*name)) {
        return Err(FeatureError::MissingFeature {
            name: missing.clone(),
            required: schema.names().to_vec(),
        });
    }

    let values = schema
        .names()
        .iter()
        .filter_map(|name| record.get(name).cloned())
        .collect();

    Ok(FeatureVector {
        names: schema.names().to_vec(),
        values,
    })
}
