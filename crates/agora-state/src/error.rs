//! Error types for the state server.

use agora_protocol::{
    Channel, ClassId, FieldId, IdsExhausted, ObjectId, SchemaError, ZoneId,
};
use agora_relation::RelationError;

/// Errors returned by [`StateServer`](crate::StateServer) operations.
///
/// A failing operation changes nothing and emits nothing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    /// The configured channel is outside the state-server range.
    #[error("{0} is not in the state-server channel range")]
    InvalidChannel(Channel),

    /// No class with this id in the schema.
    #[error("unknown class {0}")]
    UnknownClass(ClassId),

    /// No live object with this id.
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    /// The object's class has no such field.
    #[error("class {class} has no field {field}")]
    UnknownField { class: ClassId, field: FieldId },

    /// Withdrawing an interest that is not held.
    #[error("{recipient} is not interested in {zone}")]
    NotInterested { recipient: Channel, zone: ZoneId },

    /// Removing an object from a zone it is not in.
    #[error("{object} is not present in {zone}")]
    NotPresent { object: ObjectId, zone: ZoneId },

    /// Object creation with the wrong number of stored values.
    #[error("class {class} stores {expected} fields, got {got}")]
    FieldCountMismatch {
        class: ClassId,
        expected: usize,
        got: usize,
    },

    /// A value does not match the field's type signature.
    #[error("value for {field} of class {class} does not match its signature")]
    TypeMismatch { class: ClassId, field: FieldId },

    /// The sender may not originate a change of this field.
    #[error("{sender} may not set {field} on {object}")]
    Unauthorized {
        sender: Channel,
        object: ObjectId,
        field: FieldId,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    IdsExhausted(#[from] IdsExhausted),
}

impl StateError {
    /// `true` for errors a misbehaving participant causes during normal
    /// operation, as opposed to internal faults.
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, StateError::Unauthorized { .. })
    }
}
