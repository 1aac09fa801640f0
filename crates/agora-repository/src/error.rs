//! Error types for the participant repository.

use agora_protocol::{IdsExhausted, ObjectId};

/// Errors returned by [`Repository`](crate::Repository) requests.
///
/// These are raised locally, before anything is published.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    /// No class with this name in the schema.
    #[error("unknown class {0:?}")]
    UnknownClass(String),

    /// The repository knows nothing about this object (no view, no
    /// designation, not created by it).
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    /// The object's class has no field with this name.
    #[error("{object} has no field {field:?}")]
    UnknownField { object: ObjectId, field: String },

    /// This participant may not originate changes of the field.
    #[error("not permitted to send {field:?} on {object}")]
    NotPermitted { object: ObjectId, field: String },

    /// The value does not match the field's signature.
    #[error("value for {field:?} on {object} does not match its signature")]
    TypeMismatch { object: ObjectId, field: String },

    /// Request tokens ran out.
    #[error(transparent)]
    TokensExhausted(#[from] IdsExhausted),
}
