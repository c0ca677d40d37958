//! Model construction errors.

use super::object::{ObjectId, ObjectKind};
use thiserror::Error;

/// Errors raised while building a schema model. Fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// An object of the same kind and name is already declared.
    #[error("duplicate {kind} name: {name}")]
    DuplicateName {
        /// Kind of the duplicated object.
        kind: ObjectKind,
        /// The duplicated name.
        name: String,
    },

    /// An object violates a model invariant.
    #[error("validation failed for {object}: {message}")]
    Validation {
        /// The offending object.
        object: ObjectId,
        /// What is wrong with it.
        message: String,
    },

    /// An object identifier could not be parsed.
    #[error("invalid object identifier '{0}', expected kind:name")]
    InvalidIdentifier(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::DuplicateName {
            kind: ObjectKind::Table,
            name: "patients".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate table name: patients");

        let err = ModelError::Validation {
            object: ObjectId::policy("p"),
            message: "owning table t is not declared in depends_on".to_string(),
        };
        assert!(err.to_string().starts_with("validation failed for policy:p"));
    }
}
