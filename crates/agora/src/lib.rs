//! # Agora
//!
//! A distributed-object replication server. Clients and AI processes
//! connect over WebSocket; a state server decides which objects each of
//! them can see, and a message director routes everything between them.
//!
//! The layers, bottom up:
//!
//! - [`agora_protocol`]: ids, schema, messages, codec
//! - [`agora_relation`]: the relation table behind interest
//! - [`agora_director`]: the channel bus
//! - [`agora_state`]: the interest/visibility engine
//! - [`agora_repository`]: participant-side views
//! - [`agora_transport`]: WebSocket connections
//! - this crate: agents, configuration, logging, and the server binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agora::prelude::*;
//!
//! # async fn start() -> Result<(), AgoraError> {
//! let config = AgoraConfig::from_toml(r#"
//!     [classes.avatar.fields.position]
//!     types = ["float", "float"]
//!     policy = "AUTHORITY_SEND | CLIENT_RECEIVE | RAM"
//! "#)?;
//! let schema = config.schema()?;
//! AgoraServer::builder().config(config).build(schema).await?.run().await
//! # }
//! ```

mod agent;
mod config;
mod error;
mod logging;
mod server;

pub use agent::{Agent, AgentConfig, ERROR_FORBIDDEN, ERROR_MALFORMED};
pub use config::{AgoraConfig, ConfigError, LoggingSettings, NetworkSettings};
pub use error::AgoraError;
pub use logging::init_logging;
pub use server::{AgoraServer, AgoraServerBuilder};

/// Everything needed to run a server or write a participant.
pub mod prelude {
    pub use crate::{AgoraConfig, AgoraError, AgoraServer, AgoraServerBuilder};

    pub use agora_director::{Listener, MessageDirector};
    pub use agora_protocol::{
        Channel, ClassId, Envelope, FieldId, FieldPolicy, FieldValue, Message, ObjectId,
        ParticipantKind, PrimitiveType, Schema, Value, ZoneId,
    };
    pub use agora_repository::{Repository, Role, View, ViewContext, ViewRegistry};
    pub use agora_state::{StateServer, StateServerConfig};
}
