//! Error types for clinschema-core.

use crate::catalog::ModelError;
use crate::manifest::ManifestError;
use crate::resolver::ResolveError;
use thiserror::Error;

/// Fatal errors. Raised before any executor call; apply-time failures are
/// recorded in [`ApplyResult`](crate::provision::ApplyResult)s instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The model is invalid.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// No valid apply order exists.
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// The manifest could not be loaded.
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

/// Result type using the crate error.
pub type Result<T> = std::result::Result<T, Error>;
