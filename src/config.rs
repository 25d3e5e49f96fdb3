//! Server configuration from CLI flags and environment
//!
//! Every flag has an environment fallback so the binary can run under a
//! process manager without a wrapper script.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::Args;

use crate::{
    error::{Result, ServeError},
    schema::FeatureSchema,
};

/// Default model artifact path, relative to the working directory
pub const DEFAULT_MODEL_PATH: &str = "rf_model.json";

/// Options shared by the `serve` and `inspect` commands
#[derive(Debug, Clone, Args)]
pub struct ModelArgs {
    /// Path to the model artifact (JSON)
    #[arg(short, long, env = "CHURN_SERVE_MODEL", default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// JSON array of feature names overriding the built-in churn schema
    #[arg(short, long, env = "CHURN_SERVE_SCHEMA")]
    pub schema: Option<PathBuf>,
}

impl ModelArgs {
    /// Resolve the feature schema, falling back to the churn default
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Schema`] if a schema file was given and is invalid.
    pub fn load_schema(&self) -> Result<FeatureSchema> {
        match &self.schema {
            Some(path) => Ok(FeatureSchema::from_file(path)?),
            None => Ok(FeatureSchema::churn()),
        }
    }

    /// Model artifact path
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model
    }
}

/// Listener and model options for `serve`
#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    /// Host to bind to
    #[arg(short = 'H', long, env = "CHURN_SERVE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind to
    #[arg(short, long, env = "CHURN_SERVE_PORT", default_value = "5000")]
    pub port: u16,

    /// Model and schema locations
    #[command(flatten)]
    pub model: ModelArgs,
}

impl ServeConfig {
    /// Parse host and port into a socket address
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::InvalidAddress`] if they do not form one.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        };
        addr.parse().map_err(|e: std::net::AddrParseError| ServeError::InvalidAddress {
            addr,
            reason: e.to_string(),
        })
    }
}
