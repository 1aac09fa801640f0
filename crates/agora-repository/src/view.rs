//! Views: participant-local handlers for distributed objects.
//!
//! A view is plain composition. The schema describes the class; a
//! [`View`] implementation holds whatever local state the participant
//! needs (a scene node, an AI brain) and reacts to lifecycle events.
//! Factories are registered per `(class name, role)` in a
//! [`ViewRegistry`], so a client and an AI can attach completely
//! different behavior to the same class:
//!
//! ```text
//!   ("avatar", Client)    → AvatarClient   (draws the model)
//!   ("avatar", Authority) → AvatarAi       (moves it around)
//! ```
//!
//! View callbacks run while the repository's lock is held. They never get
//! a handle to the repository itself; instead they queue requests on the
//! [`ViewContext`], and the repository carries them out after the lock is
//! released.

use std::collections::HashMap;
use std::fmt;

use agora_protocol::{Channel, DClass, FieldDef, FieldValue, Message, ObjectId};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which side of the network a repository sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A player's process. Sees objects through zone interest.
    Client,
    /// A logic host (AI). May be designated as objects' authority.
    Authority,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Authority => f.write_str("authority"),
        }
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// Participant-side behavior of one distributed object.
///
/// Every method has a no-op default; implement the ones you care about.
#[allow(unused_variables)]
pub trait View: Send + 'static {
    /// The object became visible. `fields` are its stored values in
    /// storage-map order.
    fn on_created(&mut self, ctx: &mut ViewContext<'_>, fields: &[FieldValue]) {}

    /// A field update reached this participant.
    fn on_field_update(
        &mut self,
        ctx: &mut ViewContext<'_>,
        field: &FieldDef,
        value: &FieldValue,
        from: Channel,
    ) {
    }

    fn on_become_owner(&mut self, ctx: &mut ViewContext<'_>) {}

    fn on_revoke_owner(&mut self, ctx: &mut ViewContext<'_>) {}

    fn on_authority_gained(&mut self, ctx: &mut ViewContext<'_>) {}

    fn on_authority_lost(&mut self, ctx: &mut ViewContext<'_>) {}

    /// The object is no longer visible. The view is dropped afterwards.
    fn on_destroyed(&mut self, ctx: &mut ViewContext<'_>) {}
}

/// Used for classes without a registered factory: the repository still
/// tracks the object, nobody reacts to it.
pub(crate) struct Inert;

impl View for Inert {}

// ---------------------------------------------------------------------------
// ViewContext
// ---------------------------------------------------------------------------

/// A request queued by a view, carried out after the lock is released.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Request {
    Field {
        object_id: ObjectId,
        field: String,
        value: FieldValue,
    },
    Send {
        to: Channel,
        message: Message,
    },
}

/// What a view knows about its object, plus a queue for outgoing requests.
pub struct ViewContext<'a> {
    pub(crate) object_id: ObjectId,
    pub(crate) class: &'a DClass,
    pub(crate) channel: Channel,
    pub(crate) is_owner: bool,
    pub(crate) is_authority: bool,
    pub(crate) requests: &'a mut Vec<Request>,
}

impl ViewContext<'_> {
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn class(&self) -> &DClass {
        self.class
    }

    /// The repository's own channel.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    pub fn is_authority(&self) -> bool {
        self.is_authority
    }

    /// Queues a write of this object's field `field`.
    ///
    /// The capability check runs when the queue is drained; a refused
    /// write is logged and dropped.
    pub fn send_field(&mut self, field: &str, value: FieldValue) {
        self.requests.push(Request::Field {
            object_id: self.object_id,
            field: field.to_string(),
            value,
        });
    }

    /// Queues an arbitrary message, sent from the repository's channel.
    pub fn send(&mut self, to: Channel, message: Message) {
        self.requests.push(Request::Send { to, message });
    }
}

// ---------------------------------------------------------------------------
// ViewRegistry
// ---------------------------------------------------------------------------

type Factory = Box<dyn Fn(ObjectId) -> Box<dyn View> + Send + Sync>;

/// View factories keyed by `(class name, role)`.
#[derive(Default)]
pub struct ViewRegistry {
    factories: HashMap<(String, Role), Factory>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory for `class` in `role`.
    pub fn register<F, V>(&mut self, class: &str, role: Role, factory: F) -> &mut Self
    where
        F: Fn(ObjectId) -> V + Send + Sync + 'static,
        V: View,
    {
        self.factories.insert(
            (class.to_string(), role),
            Box::new(move |id| Box::new(factory(id)) as Box<dyn View>),
        );
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F, V>(mut self, class: &str, role: Role, factory: F) -> Self
    where
        F: Fn(ObjectId) -> V + Send + Sync + 'static,
        V: View,
    {
        self.register(class, role, factory);
        self
    }

    pub fn contains(&self, class: &str, role: Role) -> bool {
        self.factories.contains_key(&(class.to_string(), role))
    }

    /// Builds a view for `object_id`, if a factory is registered.
    pub fn make(&self, class: &str, role: Role, object_id: ObjectId) -> Option<Box<dyn View>> {
        self.factories
            .get(&(class.to_string(), role))
            .map(|factory| factory(object_id))
    }
}

impl fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("factories", &self.factories.len())
            .finish()
    }
}
