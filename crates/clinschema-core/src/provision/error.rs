//! Apply-time errors. Recorded in results, never raised.

use crate::catalog::ObjectId;
use serde::Serialize;
use thiserror::Error;

/// Error reported by a backend executor.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ExecutorError {
    /// Backend message.
    pub message: String,
    /// Backend status code, if the transport has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ExecutorError {
    /// Create an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Attach a backend status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Why a dependency blocked an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The dependency was attempted and failed.
    Failed,
    /// The dependency comes later in the apply order.
    NotYetProvisioned,
    /// The dependency is neither in the apply set nor in the backend.
    Missing,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::Failed => write!(f, "failed"),
            BlockReason::NotYetProvisioned => write!(f, "not yet provisioned"),
            BlockReason::Missing => write!(f, "missing from backend"),
        }
    }
}

/// Why an object ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplyError {
    /// The backend rejected the unit or the existence check.
    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// A dependency was not satisfied. No executor call was made.
    #[error("dependency {dependency} {reason}")]
    DependencyFailed {
        /// The blocking dependency.
        dependency: ObjectId,
        /// Why it blocked.
        reason: BlockReason,
    },

    /// The run was cancelled before this object was attempted.
    #[error("cancelled before apply")]
    Cancelled,
}
