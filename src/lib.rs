//! # churn-serve
//!
//! Serves a trained tabular classifier over HTTP: one JSON record of
//! customer attributes in, one class label out.
//!
//! The interesting part is the adaptation from a loosely typed JSON object to
//! the exact ordered vector the model was trained on:
//!
//! - [`schema`]: the ordered feature names (vector positions)
//! - [`features`]: record-to-vector build, first-missing-name diagnostics
//! - [`model`]: the `Classifier` seam, value coercion, tree and linear models
//! - [`service`]: the per-request pipeline and its typed error kinds
//! - [`api`]: axum routes mapping error kinds to status codes
//!
//! ## Example
//!
//! ```rust
//! use churn_serve::{features, schema::FeatureSchema};
//! use serde_json::json;
//!
//! let schema = FeatureSchema::new(["tenure", "age"]).unwrap();
//! let record = json!({"age": 41, "tenure": 12, "zip": "10115"});
//! let vector = features::build(record.as_object().unwrap(), &schema).unwrap();
//!
//! assert_eq!(vector.names(), ["tenure", "age"]);
//! assert_eq!(vector.values(), [json!(12), json!(41)]);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // tree count -> f64 for averaging
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::float_cmp)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod loader;
pub mod model;
pub mod schema;
pub mod service;

// Re-exports for convenience
pub use error::{Result, ServeError};
pub use features::{FeatureError, FeatureVector, InputRecord};
pub use model::{Classifier, PredictError};
pub use schema::FeatureSchema;
pub use service::{PredictionService, ServiceError, ServiceStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
