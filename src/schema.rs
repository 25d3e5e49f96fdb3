//! Feature schema: the ordered list of input names a model was trained on
//!
//! Position in the schema is position in the feature vector. The schema is
//! built once at startup and shared read-only afterwards.

use std::{collections::HashSet, fmt, path::Path};

use thiserror::Error;

/// Default feature order of the churn classifier
pub const CHURN_FEATURES: [&str; 12] = [
    "total_eve_minutes",
    "total_day_minutes",
    "total_night_minutes",
    "total_intl_minutes",
    "total_night_calls",
    "customer_service_calls",
    "total_day_calls",
    "total_eve_calls",
    "total_intl_calls",
    "account_length",
    "age",
    "number_vmail_messages",
];

/// Errors raised while constructing a schema
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A schema needs at least one feature
    #[error("Feature schema is empty")]
    Empty,

    /// Names must be unique, since they address vector positions
    #[error("Duplicate feature name in schema: '{0}'")]
    Duplicate(String),

    /// Schema file could not be read
    #[error("Cannot read schema file {path}: {reason}")]
    Io {
        /// File path
        path: String,
        /// I/O error text
        reason: String,
    },

    /// Schema file is not a JSON array of strings
    #[error("Cannot parse schema file {path}: {reason}")]
    Parse {
        /// File path
        path: String,
        /// Parser error text
        reason: String,
    },
}

/// Ordered, unique, immutable sequence of feature names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Create a schema, rejecting empty or duplicated name lists
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Empty`] or [`SchemaError::Duplicate`].
    pub fn new<I, S>(names: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::Duplicate(name.clone()));
            }
        }

        Ok(Self { names })
    }

    /// The 12-feature churn schema
    #[must_use]
    pub fn churn() -> Self {
        Self {
            names: CHURN_FEATURES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Read a schema from a JSON file holding an array of names
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, is not a JSON string
    /// array, or violates the schema rules.
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let names: Vec<String> = serde_json::from_str(&raw).map_err(|e| SchemaError::Parse {
            path: display,
            reason: e.to_string(),
        })?;
        Self::new(names)
    }

    /// Feature names in vector order
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of features
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a constructed schema
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}
