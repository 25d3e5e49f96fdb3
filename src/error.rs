//! Crate-level error type for startup and transport failures
//!
//! Request-scoped failures never reach this type: the prediction path
//! reports through [`crate::service::ServiceError`] and is turned into an
//! HTTP response. `ServeError` covers what can stop the process itself.

use thiserror::Error;

use crate::schema::SchemaError;

/// Errors that abort the server or a CLI command
#[derive(Debug, Error)]
pub enum ServeError {
    /// Host/port pair did not form a socket address
    #[error("Invalid listen address '{addr}': {reason}")]
    InvalidAddress {
        /// Address as given
        addr: String,
        /// Parser message
        reason: String,
    },

    /// Listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error
    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),

    /// Feature schema could not be read or was malformed
    #[error("Feature schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Result alias for startup and CLI operations
pub type Result<T> = std::result::Result<T, ServeError>;
