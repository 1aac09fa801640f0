//! The Agora state server.
//!
//! Owns every distributed object and decides who sees what. Recipients
//! (client or AI channels) express interest in zones, objects are present
//! in zones, and a recipient sees exactly the objects that share a zone
//! with it. Whenever that changes, the state server sends the affected
//! recipients `CreateObjectView` / `DestroyObjectView` over the
//! [`MessageDirector`](agora_director::MessageDirector).
//!
//! # Key types
//!
//! - [`StateServer`]: the engine; also a bus listener
//! - [`StateServerConfig`]: channel, object id range, reassignment policy
//! - [`DistributedObject`]: a snapshot of an object record
//! - [`StateError`]: what can go wrong

mod config;
mod error;
mod handler;
mod object;
mod server;
mod world;

pub use config::{ObjectIdRange, StateServerConfig};
pub use error::StateError;
pub use object::DistributedObject;
pub use server::StateServer;
