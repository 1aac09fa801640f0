//! Shared vocabulary of an Agora network.
//!
//! This crate defines everything two processes must agree on before they
//! can exchange object state:
//!
//! - **Identifiers** ([`Channel`], [`ObjectId`], [`ZoneId`], ...) and the
//!   reserved channel ranges per [`ParticipantKind`].
//! - **Schema** ([`Schema`], [`DClass`], [`FieldPolicy`]): the distributed
//!   classes, their field ids, type signatures, and policies.
//! - **Values** ([`FieldValue`], [`Value`], [`PrimitiveType`]).
//! - **Messages** ([`Message`], [`Envelope`]): the closed taxonomy of bus
//!   traffic.
//! - **Allocation** ([`IdAllocator`]): bounded, thread-safe id ranges.
//! - **Codec** ([`Codec`], [`JsonCodec`]): envelope framing for agents.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Agent (Codec → Envelope) → MessageDirector → StateServer
//! ```

mod allocator;
mod codec;
mod error;
mod ids;
mod message;
mod schema;
mod value;

pub use allocator::{IdAllocator, IdsExhausted};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::{DEFAULT_MAX_FRAME_LEN, JsonCodec};
pub use error::{ProtocolError, SchemaError};
pub use ids::{
    Channel, ChannelRange, ClassId, FieldId, ObjectId, ParticipantKind,
    RequestToken, ZoneId,
};
pub use message::{Envelope, Message, MessageKind};
pub use schema::{
    ClassDefinition, DClass, FieldDef, FieldDefinition, FieldPolicy,
    Propagation, Schema, SchemaBuilder, SchemaDefinition, Standing,
};
pub use value::{FieldValue, PrimitiveType, Value};
