//! The Agora message bus.
//!
//! Every participant of an Agora network talks through a
//! [`MessageDirector`]: a process-wide table from [`Channel`] to the set of
//! [`Listener`]s subscribed to it. Publishing an [`Envelope`] hands it to
//! every current subscriber of its destination channel, broadcast and
//! unicast alike.
//!
//! # Key types
//!
//! - [`MessageDirector`]: subscribe, unsubscribe, publish
//! - [`Listener`]: the delivery callback
//! - [`DirectorError`]: what can go wrong
//!
//! [`Channel`]: agora_protocol::Channel
//! [`Envelope`]: agora_protocol::Envelope

mod director;
mod error;
mod listener;

pub use director::MessageDirector;
pub use error::DirectorError;
pub use listener::Listener;
