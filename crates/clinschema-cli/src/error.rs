//! Error types for the command-line front end.

use clinschema_core::ManifestError;
use thiserror::Error;

/// Errors that abort a command-line run.
#[derive(Debug, Error)]
pub enum CliError {
    /// The manifest could not be loaded.
    #[error("{0}")]
    Manifest(#[from] ManifestError),

    /// The pipeline refused the model.
    #[error("{0}")]
    Provisioning(#[from] clinschema_core::Error),

    /// An artifact could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An artifact could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking provisioning task panicked or was aborted.
    #[error("provisioning task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type using the command-line error.
pub type Result<T> = std::result::Result<T, CliError>;
