//! The state server: object lifecycle, interest, and field policy.
//!
//! # Visibility
//!
//! A recipient *sees* an object if and only if some zone holds both the
//! recipient's interest and the object's presence:
//!
//! ```text
//!   recipient ──interest── zone ──presence── object
//! ```
//!
//! Nothing about visibility is cached. Each mutating operation computes
//! "seen before" and "seen after" around its one change to the relation,
//! and the difference is exactly the set of views to create or destroy.
//!
//! # Locking and emission
//!
//! All state sits behind one [`parking_lot::Mutex`]. While it is held, an
//! operation mutates the relation, computes its delta, and queues the
//! resulting envelopes in a local FIFO outbox. The outbox is published to
//! the [`MessageDirector`] only after the lock is released:
//!
//! ```text
//!   lock ─► mutate ─► delta ─► queue ─► unlock ─► publish queue in order
//! ```
//!
//! A listener that calls straight back into the state server from its
//! `deliver` therefore never deadlocks, and the caller observes the
//! events of one operation in the order they were produced.

use std::collections::BTreeSet;
use std::sync::Arc;

use agora_director::{Listener, MessageDirector};
use agora_protocol::{
    Channel, ClassId, FieldId, FieldValue, IdAllocator, Message, ObjectId,
    ParticipantKind, Propagation, Schema, SchemaError, ZoneId,
};
use parking_lot::Mutex;

use crate::world::{Column, Node, Outbox, World};
use crate::{DistributedObject, StateError, StateServerConfig};

/// The interest/visibility engine.
pub struct StateServer {
    config: StateServerConfig,
    schema: Arc<Schema>,
    director: Arc<MessageDirector>,
    ids: IdAllocator,
    world: Mutex<World>,
}

impl StateServer {
    /// Creates a state server. It hears nothing until [`attach`]ed.
    ///
    /// # Errors
    /// [`StateError::InvalidChannel`] if `config.channel` is not in the
    /// state-server range.
    ///
    /// [`attach`]: StateServer::attach
    pub fn new(
        config: StateServerConfig,
        schema: Arc<Schema>,
        director: Arc<MessageDirector>,
    ) -> Result<Self, StateError> {
        if !ParticipantKind::StateServer.range().contains(config.channel) {
            return Err(StateError::InvalidChannel(config.channel));
        }
        let ids = IdAllocator::new(config.object_ids.first, config.object_ids.last);
        Ok(Self {
            config,
            schema,
            director,
            ids,
            world: Mutex::new(World::new()),
        })
    }

    /// The instance's own channel.
    pub fn channel(&self) -> Channel {
        self.config.channel
    }

    pub fn config(&self) -> &StateServerConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    // -----------------------------------------------------------------------
    // Bus wiring
    // -----------------------------------------------------------------------

    /// Subscribes to `ALL_STATE_SERVERS` and the instance's own channel.
    pub fn attach(self: &Arc<Self>) {
        let me: Arc<dyn Listener> = Arc::clone(self) as Arc<dyn Listener>;
        self.director
            .subscribe(Channel::ALL_STATE_SERVERS, Arc::clone(&me));
        self.director.subscribe(self.config.channel, me);
        tracing::info!(channel = %self.config.channel, "state server attached");
    }

    /// Drops every subscription, releasing the bus's reference to `self`.
    pub fn detach(self: &Arc<Self>) {
        let me: Arc<dyn Listener> = Arc::clone(self) as Arc<dyn Listener>;
        self.director.unsubscribe_all(&me);
        tracing::info!(channel = %self.config.channel, "state server detached");
    }

    pub(crate) fn director(&self) -> &MessageDirector {
        &self.director
    }

    fn flush(&self, mut outbox: Outbox) {
        for envelope in outbox.drain() {
            self.director.publish(envelope);
        }
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Creates an object of `class_id` with its stored field values.
    ///
    /// The object is invisible until it is placed in a zone.
    ///
    /// # Errors
    /// - [`StateError::UnknownClass`]
    /// - [`StateError::FieldCountMismatch`] if `field_values` does not have
    ///   one entry per stored field
    /// - [`StateError::TypeMismatch`] if a value does not fit its field
    /// - [`StateError::IdsExhausted`]
    pub fn create_object(
        &self,
        class_id: ClassId,
        field_values: Vec<FieldValue>,
    ) -> Result<ObjectId, StateError> {
        let class = self
            .schema
            .class(class_id)
            .ok_or(StateError::UnknownClass(class_id))?;
        let expected = class.storage_map().len();
        if field_values.len() != expected {
            return Err(StateError::FieldCountMismatch {
                class: class_id,
                expected,
                got: field_values.len(),
            });
        }
        if let Some(field) = class.first_nonconforming(&field_values) {
            return Err(StateError::TypeMismatch {
                class: class_id,
                field,
            });
        }

        let object_id = ObjectId(self.ids.allocate()?);
        {
            let mut world = self.world.lock();
            world.relation.add(Column::Objects, Node::Object(object_id))?;
            world.objects.insert(
                object_id,
                DistributedObject::new(object_id, class_id, field_values),
            );
        }

        tracing::info!(object = %object_id, class = class.name(), "object created");
        Ok(object_id)
    }

    /// Destroys an object. Every recipient that saw it gets a
    /// `DestroyObjectView`; returns those recipients.
    ///
    /// The owner then gets `RevokeOwner` and the authority
    /// `DestroyAuthorityView`, regardless of `retract_previous_holder`.
    pub fn destroy_object(&self, object_id: ObjectId) -> Result<BTreeSet<Channel>, StateError> {
        let mut outbox = Outbox::new(self.config.channel);
        let viewers = {
            let mut world = self.world.lock();
            let (owner, authority) = match world.objects.get(&object_id) {
                Some(object) => (object.owner(), object.authority()),
                None => return Err(StateError::UnknownObject(object_id)),
            };
            let viewers = world.seers(object_id);
            let zones = world.relation.remove(&Node::Object(object_id))?;
            world.objects.remove(&object_id);
            world.prune_zones(&zones);
            for viewer in &viewers {
                outbox.push(*viewer, Message::DestroyObjectView { object_id });
            }
            if let Some(owner) = owner {
                outbox.push(owner, Message::RevokeOwner { object_id });
            }
            if let Some(authority) = authority {
                outbox.push(authority, Message::DestroyAuthorityView { object_id });
            }
            viewers
        };
        self.flush(outbox);

        tracing::info!(object = %object_id, viewers = viewers.len(), "object destroyed");
        Ok(viewers)
    }

    // -----------------------------------------------------------------------
    // Interest (recipient ↔ zone)
    // -----------------------------------------------------------------------

    /// Makes `recipient` interested in `zone`, creating either lazily.
    ///
    /// Returns the objects that just became visible to `recipient`; each
    /// one is sent to it as a `CreateObjectView`, in ascending id order.
    /// Re-asserting a held interest returns an empty set.
    pub fn set_interest(
        &self,
        recipient: Channel,
        zone: ZoneId,
    ) -> Result<BTreeSet<ObjectId>, StateError> {
        let mut outbox = Outbox::new(self.config.channel);
        let revealed = {
            let mut world = self.world.lock();
            let (r, z) = (Node::Recipient(recipient), Node::Zone(zone));
            world.ensure(r)?;
            world.ensure(z)?;

            let before = world.seen_by(recipient);
            world.relation.assoc(&r, &z)?;
            let after = world.seen_by(recipient);

            let revealed: BTreeSet<ObjectId> = after.difference(&before).copied().collect();
            for object in &revealed {
                world.queue_view(&mut outbox, recipient, *object);
            }
            revealed
        };
        self.flush(outbox);

        tracing::debug!(%recipient, %zone, revealed = revealed.len(), "interest set");
        Ok(revealed)
    }

    /// Withdraws `recipient`'s interest in `zone`.
    ///
    /// Returns the objects that just became invisible; each one is sent a
    /// `DestroyObjectView`.
    ///
    /// # Errors
    /// [`StateError::NotInterested`] if the interest is not held.
    pub fn unset_interest(
        &self,
        recipient: Channel,
        zone: ZoneId,
    ) -> Result<BTreeSet<ObjectId>, StateError> {
        let mut outbox = Outbox::new(self.config.channel);
        let hidden = {
            let mut world = self.world.lock();
            let (r, z) = (Node::Recipient(recipient), Node::Zone(zone));
            if !world.relation.are_associated(&r, &z) {
                return Err(StateError::NotInterested { recipient, zone });
            }

            let before = world.seen_by(recipient);
            world.relation.dissoc(&r, &z)?;
            let after = world.seen_by(recipient);
            world.prune_zone(zone);

            let hidden: BTreeSet<ObjectId> = before.difference(&after).copied().collect();
            for object_id in &hidden {
                outbox.push(
                    recipient,
                    Message::DestroyObjectView {
                        object_id: *object_id,
                    },
                );
            }
            hidden
        };
        self.flush(outbox);

        tracing::debug!(%recipient, %zone, hidden = hidden.len(), "interest unset");
        Ok(hidden)
    }

    // -----------------------------------------------------------------------
    // Presence (object ↔ zone)
    // -----------------------------------------------------------------------

    /// Places `object_id` into `zone`, creating the zone lazily.
    ///
    /// Returns the recipients that just started seeing the object; each one
    /// is sent a `CreateObjectView`.
    pub fn add_presence(
        &self,
        object_id: ObjectId,
        zone: ZoneId,
    ) -> Result<BTreeSet<Channel>, StateError> {
        let mut outbox = Outbox::new(self.config.channel);
        let gained = {
            let mut world = self.world.lock();
            if !world.objects.contains_key(&object_id) {
                return Err(StateError::UnknownObject(object_id));
            }
            let (o, z) = (Node::Object(object_id), Node::Zone(zone));
            world.ensure(z)?;

            let before = world.seers(object_id);
            world.relation.assoc(&o, &z)?;
            let after = world.seers(object_id);

            let gained: BTreeSet<Channel> = after.difference(&before).copied().collect();
            for recipient in &gained {
                world.queue_view(&mut outbox, *recipient, object_id);
            }
            gained
        };
        self.flush(outbox);

        tracing::debug!(object = %object_id, %zone, gained = gained.len(), "presence added");
        Ok(gained)
    }

    /// Takes `object_id` out of `zone`.
    ///
    /// Returns the recipients that stopped seeing the object; each one is
    /// sent a `DestroyObjectView`.
    ///
    /// # Errors
    /// - [`StateError::UnknownObject`]
    /// - [`StateError::NotPresent`] if the object is not in the zone
    pub fn remove_presence(
        &self,
        object_id: ObjectId,
        zone: ZoneId,
    ) -> Result<BTreeSet<Channel>, StateError> {
        let mut outbox = Outbox::new(self.config.channel);
        let lost = {
            let mut world = self.world.lock();
            if !world.objects.contains_key(&object_id) {
                return Err(StateError::UnknownObject(object_id));
            }
            let (o, z) = (Node::Object(object_id), Node::Zone(zone));
            if !world.relation.are_associated(&o, &z) {
                return Err(StateError::NotPresent {
                    object: object_id,
                    zone,
                });
            }

            let before = world.seers(object_id);
            world.relation.dissoc(&o, &z)?;
            let after = world.seers(object_id);
            world.prune_zone(zone);

            let lost: BTreeSet<Channel> = before.difference(&after).copied().collect();
            for recipient in &lost {
                outbox.push(*recipient, Message::DestroyObjectView { object_id });
            }
            lost
        };
        self.flush(outbox);

        tracing::debug!(object = %object_id, %zone, lost = lost.len(), "presence removed");
        Ok(lost)
    }

    // -----------------------------------------------------------------------
    // Owner / authority
    // -----------------------------------------------------------------------

    /// Designates `authority` as the object's authority and sends it a
    /// `CreateAuthorityView`.
    ///
    /// With `retract_previous_holder`, a different previous authority first
    /// gets a `DestroyAuthorityView`. Re-designating the current authority
    /// changes nothing.
    pub fn set_authority(&self, authority: Channel, object_id: ObjectId) -> Result<(), StateError> {
        let mut outbox = Outbox::new(self.config.channel);
        {
            let mut world = self.world.lock();
            let object = world
                .objects
                .get_mut(&object_id)
                .ok_or(StateError::UnknownObject(object_id))?;
            let previous = object.authority.replace(authority);
            if previous == Some(authority) {
                return Ok(());
            }
            if let Some(previous) = previous.filter(|_| self.config.retract_previous_holder) {
                outbox.push(previous, Message::DestroyAuthorityView { object_id });
            }
            outbox.push(authority, Message::CreateAuthorityView { object_id });
        }
        self.flush(outbox);

        tracing::info!(object = %object_id, %authority, "authority set");
        Ok(())
    }

    /// Designates `owner` as the object's owner and sends it `BecomeOwner`.
    ///
    /// With `retract_previous_holder`, a different previous owner first gets
    /// `RevokeOwner`. Re-designating the current owner changes nothing.
    pub fn set_owner(&self, owner: Channel, object_id: ObjectId) -> Result<(), StateError> {
        let mut outbox = Outbox::new(self.config.channel);
        {
            let mut world = self.world.lock();
            let object = world
                .objects
                .get_mut(&object_id)
                .ok_or(StateError::UnknownObject(object_id))?;
            let previous = object.owner.replace(owner);
            if previous == Some(owner) {
                return Ok(());
            }
            if let Some(previous) = previous.filter(|_| self.config.retract_previous_holder) {
                outbox.push(previous, Message::RevokeOwner { object_id });
            }
            outbox.push(owner, Message::BecomeOwner { object_id });
        }
        self.flush(outbox);

        tracing::info!(object = %object_id, %owner, "owner set");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fields
    // -----------------------------------------------------------------------

    /// Applies a field write from `source`.
    ///
    /// The write must be permitted by the field's origin bits given the
    /// source's standing, and the value must match the field's signature.
    /// Stored fields are updated in place. A `FieldUpdate` (sent as
    /// `source`) then goes to every viewer, the owner, or the authority,
    /// per the field's propagation bit.
    ///
    /// # Errors
    /// [`StateError::Unauthorized`] if `source` may not originate the
    /// change; nothing is stored or sent.
    pub fn set_field(
        &self,
        source: Channel,
        object_id: ObjectId,
        field_id: FieldId,
        value: FieldValue,
    ) -> Result<(), StateError> {
        let mut outbox = Outbox::new(self.config.channel);
        {
            let mut world = self.world.lock();
            let object = world
                .objects
                .get(&object_id)
                .ok_or(StateError::UnknownObject(object_id))?;
            let class_id = object.class_id();
            let class = self
                .schema
                .class(class_id)
                .ok_or(StateError::UnknownClass(class_id))?;
            let field = class.field(field_id).ok_or(StateError::UnknownField {
                class: class_id,
                field: field_id,
            })?;

            let policy = field.policy();
            if !policy.permits_origin(object.standing(source)) {
                return Err(StateError::Unauthorized {
                    sender: source,
                    object: object_id,
                    field: field_id,
                });
            }
            if !value.conforms_to(field.types()) {
                return Err(StateError::TypeMismatch {
                    class: class_id,
                    field: field_id,
                });
            }
            let propagation = policy.propagation().ok_or_else(|| SchemaError::NoPropagation {
                class: class.name().to_string(),
                field: field.name().to_string(),
            })?;

            let targets: Vec<Channel> = match propagation {
                Propagation::AllViewers => world.seers(object_id).into_iter().collect(),
                Propagation::Owner => object.owner().into_iter().collect(),
                Propagation::Authority => object.authority().into_iter().collect(),
            };

            if let Some(index) = class.storage_index(field_id) {
                if let Some(object) = world.objects.get_mut(&object_id) {
                    object.store(index, value.clone());
                }
            }

            for target in targets {
                outbox.relay(
                    source,
                    target,
                    Message::FieldUpdate {
                        object_id,
                        field_id,
                        value: value.clone(),
                    },
                );
            }
        }
        self.flush(outbox);

        tracing::trace!(%source, object = %object_id, field = %field_id, "field set");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Recipients
    // -----------------------------------------------------------------------

    /// Forgets a departed recipient.
    ///
    /// Retracts all of its interests without sending it anything, removes it
    /// from the relation, and clears any owner/authority designation it
    /// held. Returns the objects it could see. Unknown channels are fine
    /// and yield an empty set.
    pub fn drop_recipient(&self, recipient: Channel) -> Result<BTreeSet<ObjectId>, StateError> {
        let seen = {
            let mut world = self.world.lock();
            let node = Node::Recipient(recipient);
            let seen = world.seen_by(recipient);
            if world.relation.contains(&node) {
                let zones = world.relation.remove(&node)?;
                world.prune_zones(&zones);
            }
            for object in world.objects.values_mut() {
                object.release(recipient);
            }
            seen
        };

        tracing::debug!(%recipient, saw = seen.len(), "recipient dropped");
        Ok(seen)
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    /// Objects `recipient` currently sees. Empty for unknown recipients.
    pub fn objects_seen_by(&self, recipient: Channel) -> BTreeSet<ObjectId> {
        self.world.lock().seen_by(recipient)
    }

    /// Recipients currently seeing `object_id`.
    pub fn recipients_seeing(&self, object_id: ObjectId) -> Result<BTreeSet<Channel>, StateError> {
        let world = self.world.lock();
        if !world.objects.contains_key(&object_id) {
            return Err(StateError::UnknownObject(object_id));
        }
        Ok(world.seers(object_id))
    }

    /// A snapshot of the object's record.
    pub fn object(&self, object_id: ObjectId) -> Option<DistributedObject> {
        self.world.lock().objects.get(&object_id).cloned()
    }

    /// Stored field values, in storage-map order.
    pub fn object_fields(&self, object_id: ObjectId) -> Result<Vec<FieldValue>, StateError> {
        self.with_object(object_id, |o| o.fields().to_vec())
    }

    pub fn object_owner(&self, object_id: ObjectId) -> Result<Option<Channel>, StateError> {
        self.with_object(object_id, DistributedObject::owner)
    }

    pub fn object_authority(&self, object_id: ObjectId) -> Result<Option<Channel>, StateError> {
        self.with_object(object_id, DistributedObject::authority)
    }

    pub fn object_count(&self) -> usize {
        self.world.lock().objects.len()
    }

    pub fn zone_count(&self) -> usize {
        self.world.lock().count(Column::Zones)
    }

    pub fn recipient_count(&self) -> usize {
        self.world.lock().count(Column::Recipients)
    }

    fn with_object<R>(
        &self,
        object_id: ObjectId,
        f: impl FnOnce(&DistributedObject) -> R,
    ) -> Result<R, StateError> {
        self.world
            .lock()
            .objects
            .get(&object_id)
            .map(f)
            .ok_or(StateError::UnknownObject(object_id))
    }
}

impl std::fmt::Debug for StateServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateServer")
            .field("channel", &self.config.channel)
            .field("objects", &self.object_count())
            .finish()
    }
}
