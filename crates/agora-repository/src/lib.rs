//! Participant-side object views for Agora.
//!
//! Clients and AIs keep a [`Repository`]: it listens on the participant's
//! channel, turns `CreateObjectView` / `DestroyObjectView` into live
//! [`View`]s, routes field updates to them, and sends the participant's
//! requests (create objects, set interest, write fields) to the state
//! server.
//!
//! Behavior is attached by composition: register a view factory per
//! `(class name, role)` in a [`ViewRegistry`]. Whether this participant may
//! send or receive a field is decided from the field's policy bits, not
//! from which methods a view happens to implement.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use agora_director::MessageDirector;
//! use agora_protocol::{Channel, Schema};
//! use agora_repository::{Repository, Role, View, ViewRegistry};
//!
//! struct Door;
//! impl View for Door {}
//!
//! let registry = ViewRegistry::new().with("door", Role::Client, |_| Door);
//! let repo = Arc::new(Repository::new(
//!     Channel(100_001),
//!     Role::Client,
//!     Arc::new(Schema::builder().class("door").build().unwrap()),
//!     Arc::new(MessageDirector::new()),
//!     registry,
//! ));
//! repo.attach();
//! ```

mod error;
mod repository;
mod view;

pub use error::RepositoryError;
pub use repository::{CreationCallback, Repository};
pub use view::{Role, View, ViewContext, ViewRegistry};
