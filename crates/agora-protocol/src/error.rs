//! Error types for the protocol layer.
//!
//! [`ProtocolError`] covers turning envelopes into bytes and back.
//! [`SchemaError`] covers building a [`Schema`](crate::Schema) from class
//! definitions; it is kept separate because schema problems are
//! configuration mistakes found at startup, not traffic problems.

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes, missing fields, or an
    /// unknown message type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame exceeds the codec's size limit and was not parsed.
    #[error("frame of {len} bytes exceeds limit of {limit}")]
    FrameTooLarge { len: usize, limit: usize },

    /// The message decoded fine but breaks a protocol rule, e.g. a client
    /// sending an administrative message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Errors found while validating class definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The field names no propagation bit, so updates would go nowhere.
    #[error("field {class}.{field} has no propagation bit set")]
    NoPropagation { class: String, field: String },

    /// The field names more than one propagation bit.
    #[error("field {class}.{field} has more than one propagation bit set")]
    ConflictingPropagation { class: String, field: String },

    /// Nobody may ever write the field.
    #[error("field {class}.{field} has no origin bit set")]
    NoOrigin { class: String, field: String },
}
