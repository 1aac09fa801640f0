//! The repository: a participant's collection of live views.

use std::collections::HashMap;
use std::sync::Arc;

use agora_director::{Listener, MessageDirector};
use agora_protocol::{
    Channel, ClassId, Envelope, FieldValue, IdAllocator, Message, ObjectId, RequestToken,
    Schema, Standing, ZoneId,
};
use parking_lot::Mutex;

use crate::view::{Inert, Request};
use crate::{RepositoryError, Role, View, ViewContext, ViewRegistry};

/// Called once the state server confirms an object this repository asked
/// for.
pub type CreationCallback = Box<dyn FnOnce(&Repository, ObjectId) + Send>;

/// What the repository knows about one object.
struct Record {
    class_id: Option<ClassId>,
    view: Option<Box<dyn View>>,
    is_owner: bool,
    is_authority: bool,
}

impl Record {
    fn empty(class_id: Option<ClassId>) -> Self {
        Self {
            class_id,
            view: None,
            is_owner: false,
            is_authority: false,
        }
    }

    /// Nothing left worth remembering.
    fn is_idle(&self) -> bool {
        self.view.is_none() && !self.is_owner && !self.is_authority
    }
}

struct Creation {
    class_id: ClassId,
    callback: CreationCallback,
}

#[derive(Default)]
struct Inner {
    records: HashMap<ObjectId, Record>,
    creations: HashMap<RequestToken, Creation>,
}

/// A participant's view of the network.
///
/// Subscribe it to its channel with [`attach`](Repository::attach). It then
/// creates and destroys views as the state server reports visibility
/// changes, and offers the requests a participant can make.
pub struct Repository {
    channel: Channel,
    role: Role,
    state_server: Channel,
    schema: Arc<Schema>,
    director: Arc<MessageDirector>,
    registry: ViewRegistry,
    tokens: IdAllocator,
    inner: Mutex<Inner>,
}

impl Repository {
    /// Creates a repository on `channel`. Requests go to
    /// `ALL_STATE_SERVERS` unless redirected with
    /// [`with_state_server`](Self::with_state_server).
    pub fn new(
        channel: Channel,
        role: Role,
        schema: Arc<Schema>,
        director: Arc<MessageDirector>,
        registry: ViewRegistry,
    ) -> Self {
        Self {
            channel,
            role,
            state_server: Channel::ALL_STATE_SERVERS,
            schema,
            director,
            registry,
            tokens: IdAllocator::new(0, u64::MAX),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Addresses requests to one state server instead of all of them.
    pub fn with_state_server(mut self, channel: Channel) -> Self {
        self.state_server = channel;
        self
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Subscribes to the repository's own channel.
    pub fn attach(self: &Arc<Self>) {
        let me: Arc<dyn Listener> = Arc::clone(self) as Arc<dyn Listener>;
        self.director.subscribe(self.channel, me);
    }

    /// Drops the repository's subscriptions.
    pub fn detach(self: &Arc<Self>) {
        let me: Arc<dyn Listener> = Arc::clone(self) as Arc<dyn Listener>;
        self.director.unsubscribe_all(&me);
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Asks the state server for a new object of class `class`.
    ///
    /// `callback` runs when `ObjectCreated` comes back.
    pub fn create_object(
        &self,
        class: &str,
        field_values: Vec<FieldValue>,
        callback: impl FnOnce(&Repository, ObjectId) + Send + 'static,
    ) -> Result<RequestToken, RepositoryError> {
        let class_id = self
            .schema
            .class_by_name(class)
            .ok_or_else(|| RepositoryError::UnknownClass(class.to_string()))?
            .id();
        let request_token = RequestToken(self.tokens.allocate()?);
        self.inner.lock().creations.insert(
            request_token,
            Creation {
                class_id,
                callback: Box::new(callback),
            },
        );
        self.request(Message::CreateObject {
            class_id,
            field_values,
            request_token,
        });
        Ok(request_token)
    }

    pub fn destroy_object(&self, object_id: ObjectId) {
        self.request(Message::DestroyObject { object_id });
    }

    pub fn set_interest(&self, recipient: Channel, zone: ZoneId) {
        self.request(Message::SetInterest { recipient, zone });
    }

    pub fn unset_interest(&self, recipient: Channel, zone: ZoneId) {
        self.request(Message::UnsetInterest { recipient, zone });
    }

    pub fn add_to_zone(&self, object_id: ObjectId, zone: ZoneId) {
        self.request(Message::AddToZone { object_id, zone });
    }

    pub fn remove_from_zone(&self, object_id: ObjectId, zone: ZoneId) {
        self.request(Message::RemoveFromZone { object_id, zone });
    }

    pub fn set_owner(&self, owner: Channel, object_id: ObjectId) {
        self.request(Message::SetOwner { owner, object_id });
    }

    pub fn set_authority(&self, authority: Channel, object_id: ObjectId) {
        self.request(Message::SetAuthority {
            authority,
            object_id,
        });
    }

    /// Writes a field, after checking locally that this participant may
    /// originate it.
    ///
    /// # Errors
    /// - [`RepositoryError::UnknownObject`] / [`RepositoryError::UnknownField`]
    /// - [`RepositoryError::NotPermitted`] if the field's origin bits do not
    ///   allow this participant's standing
    /// - [`RepositoryError::TypeMismatch`]
    pub fn send_field(
        &self,
        object_id: ObjectId,
        field: &str,
        value: FieldValue,
    ) -> Result<(), RepositoryError> {
        let (class_id, standing) = {
            let inner = self.inner.lock();
            let record = inner
                .records
                .get(&object_id)
                .ok_or(RepositoryError::UnknownObject(object_id))?;
            let class_id = record.class_id.ok_or(RepositoryError::UnknownObject(object_id))?;
            (class_id, self.standing(record))
        };
        let def = self
            .schema
            .class(class_id)
            .and_then(|class| class.field_by_name(field))
            .ok_or_else(|| RepositoryError::UnknownField {
                object: object_id,
                field: field.to_string(),
            })?;
        if !def.policy().permits_origin(standing) {
            return Err(RepositoryError::NotPermitted {
                object: object_id,
                field: field.to_string(),
            });
        }
        if !value.conforms_to(def.types()) {
            return Err(RepositoryError::TypeMismatch {
                object: object_id,
                field: field.to_string(),
            });
        }

        self.request(Message::SetField {
            object_id,
            field_id: def.id(),
            value,
        });
        Ok(())
    }

    fn request(&self, message: Message) {
        self.director.send(self.channel, self.state_server, message);
    }

    fn standing(&self, record: &Record) -> Standing {
        Standing {
            is_owner: record.is_owner,
            is_authority: self.role == Role::Authority && record.is_authority,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Whether a view of `object_id` is live.
    pub fn has_view(&self, object_id: ObjectId) -> bool {
        self.inner
            .lock()
            .records
            .get(&object_id)
            .is_some_and(|r| r.view.is_some())
    }

    pub fn is_owner(&self, object_id: ObjectId) -> bool {
        self.inner
            .lock()
            .records
            .get(&object_id)
            .is_some_and(|r| r.is_owner)
    }

    pub fn is_authority(&self, object_id: ObjectId) -> bool {
        self.inner
            .lock()
            .records
            .get(&object_id)
            .is_some_and(|r| r.is_authority)
    }

    /// Number of live views.
    pub fn view_count(&self) -> usize {
        self.inner
            .lock()
            .records
            .values()
            .filter(|r| r.view.is_some())
            .count()
    }

    /// Creations requested but not yet confirmed.
    pub fn pending_creations(&self) -> usize {
        self.inner.lock().creations.len()
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Runs `hook` on the object's view, if both the view and its class
    /// exist. Requests it queues land in `requests`.
    fn with_view(
        &self,
        record: &mut Record,
        object_id: ObjectId,
        requests: &mut Vec<Request>,
        hook: impl FnOnce(&mut dyn View, &mut ViewContext<'_>),
    ) {
        let Some(class) = record.class_id.and_then(|id| self.schema.class(id)) else {
            return;
        };
        let is_owner = record.is_owner;
        let is_authority = record.is_authority;
        if let Some(view) = record.view.as_mut() {
            let mut ctx = ViewContext {
                object_id,
                class,
                channel: self.channel,
                is_owner,
                is_authority,
                requests,
            };
            hook(&mut **view, &mut ctx);
        }
    }

    fn handle(
        &self,
        envelope: &Envelope,
        requests: &mut Vec<Request>,
    ) -> Option<(CreationCallback, ObjectId)> {
        let mut inner = self.inner.lock();
        match &envelope.message {
            Message::CreateObjectView {
                object_id,
                class_id,
                field_values,
            } => {
                let Some(class) = self.schema.class(*class_id) else {
                    tracing::warn!(object = %object_id, class = %class_id, "view of unknown class");
                    return None;
                };
                let view = self
                    .registry
                    .make(class.name(), self.role, *object_id)
                    .unwrap_or_else(|| Box::new(Inert));
                let record = inner
                    .records
                    .entry(*object_id)
                    .or_insert_with(|| Record::empty(Some(*class_id)));
                record.class_id = Some(*class_id);
                record.view = Some(view);
                self.with_view(record, *object_id, requests, |view, ctx| {
                    view.on_created(ctx, field_values)
                });
                tracing::debug!(channel = %self.channel, object = %object_id, class = class.name(), "view created");
            }
            Message::DestroyObjectView { object_id } => {
                if let Some(record) = inner.records.get_mut(object_id) {
                    self.with_view(record, *object_id, requests, |view, ctx| view.on_destroyed(ctx));
                    record.view = None;
                    if record.is_idle() {
                        inner.records.remove(object_id);
                    }
                    tracing::debug!(channel = %self.channel, object = %object_id, "view destroyed");
                }
            }
            Message::FieldUpdate {
                object_id,
                field_id,
                value,
            } => {
                let Some(record) = inner.records.get_mut(object_id) else {
                    return None;
                };
                let standing = self.standing(record);
                let Some(field) = record
                    .class_id
                    .and_then(|id| self.schema.class(id))
                    .and_then(|class| class.field(*field_id))
                else {
                    return None;
                };
                if field.policy().reaches(standing) {
                    self.with_view(record, *object_id, requests, |view, ctx| {
                        view.on_field_update(ctx, field, value, envelope.from)
                    });
                }
            }
            Message::BecomeOwner { object_id } => {
                let record = inner
                    .records
                    .entry(*object_id)
                    .or_insert_with(|| Record::empty(None));
                record.is_owner = true;
                self.with_view(record, *object_id, requests, |view, ctx| view.on_become_owner(ctx));
            }
            Message::RevokeOwner { object_id } => {
                if let Some(record) = inner.records.get_mut(object_id) {
                    record.is_owner = false;
                    self.with_view(record, *object_id, requests, |view, ctx| view.on_revoke_owner(ctx));
                    if record.is_idle() {
                        inner.records.remove(object_id);
                    }
                }
            }
            Message::CreateAuthorityView { object_id } => {
                let record = inner
                    .records
                    .entry(*object_id)
                    .or_insert_with(|| Record::empty(None));
                record.is_authority = true;
                self.with_view(record, *object_id, requests, |view, ctx| {
                    view.on_authority_gained(ctx)
                });
            }
            Message::DestroyAuthorityView { object_id } => {
                if let Some(record) = inner.records.get_mut(object_id) {
                    record.is_authority = false;
                    self.with_view(record, *object_id, requests, |view, ctx| {
                        view.on_authority_lost(ctx)
                    });
                    if record.is_idle() {
                        inner.records.remove(object_id);
                    }
                }
            }
            Message::ObjectCreated {
                object_id,
                request_token,
            } => {
                let Some(creation) = inner.creations.remove(request_token) else {
                    tracing::warn!(channel = %self.channel, token = %request_token, "unexpected creation reply");
                    return None;
                };
                // The callback may address fields before the object is seen.
                inner
                    .records
                    .entry(*object_id)
                    .or_insert_with(|| Record::empty(None))
                    .class_id
                    .get_or_insert(creation.class_id);
                return Some((creation.callback, *object_id));
            }
            Message::AiConnected { .. }
            | Message::AiDisconnected { .. }
            | Message::AiChannelAssigned { .. }
            | Message::ClientConnected { .. }
            | Message::ClientDisconnected { .. }
            | Message::DisconnectClient { .. }
            | Message::Connected { .. }
            | Message::Disconnected { .. }
            | Message::Disconnect
            | Message::Error { .. }
            | Message::CreateObject { .. }
            | Message::DestroyObject { .. }
            | Message::SetInterest { .. }
            | Message::UnsetInterest { .. }
            | Message::AddToZone { .. }
            | Message::RemoveFromZone { .. }
            | Message::SetAuthority { .. }
            | Message::SetOwner { .. }
            | Message::SetField { .. } => {
                tracing::trace!(channel = %self.channel, kind = %envelope.message.kind(), "ignored");
            }
        }
        None
    }

    /// Drops the creator's class-only record unless the creation callback
    /// left this participant viewing or holding the object.
    fn forget_if_idle(&self, object_id: ObjectId) {
        let mut inner = self.inner.lock();
        if inner.records.get(&object_id).is_some_and(Record::is_idle) {
            inner.records.remove(&object_id);
        }
    }

    fn run(&self, requests: Vec<Request>) {
        for request in requests {
            match request {
                Request::Field {
                    object_id,
                    field,
                    value,
                } => {
                    if let Err(error) = self.send_field(object_id, &field, value) {
                        tracing::warn!(channel = %self.channel, %error, "view request refused");
                    }
                }
                Request::Send { to, message } => {
                    self.director.send(self.channel, to, message);
                }
            }
        }
    }
}

impl Listener for Repository {
    fn deliver(&self, envelope: &Envelope) {
        let mut requests = Vec::new();
        let completed = self.handle(envelope, &mut requests);
        self.run(requests);
        if let Some((callback, object_id)) = completed {
            callback(self, object_id);
            self.forget_if_idle(object_id);
        }
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("channel", &self.channel)
            .field("role", &self.role)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_protocol::{FieldPolicy, PrimitiveType, Value};

    const SS: Channel = Channel(100);
    const ME: Channel = Channel(1_000);

    fn repository() -> Arc<Repository> {
        let schema = Schema::builder()
            .field(
                "door",
                "open",
                &[PrimitiveType::Bool],
                FieldPolicy::AUTHORITY_SEND | FieldPolicy::CLIENT_RECEIVE | FieldPolicy::RAM,
            )
            .build()
            .unwrap();
        let repo = Arc::new(Repository::new(
            ME,
            Role::Authority,
            Arc::new(schema),
            Arc::new(MessageDirector::new()),
            ViewRegistry::new(),
        ));
        repo.attach();
        repo
    }

    fn deliver(repo: &Repository, message: Message) {
        repo.deliver(&Envelope::new(SS, ME, message));
    }

    #[test]
    fn test_designation_before_view_is_remembered() {
        let repo = repository();
        let o = ObjectId(5);
        deliver(&repo, Message::CreateAuthorityView { object_id: o });
        assert!(repo.is_authority(o));
        assert!(!repo.has_view(o));

        // No class known yet, so fields cannot be addressed.
        assert_eq!(
            repo.send_field(o, "open", Value::Bool(true).into()),
            Err(RepositoryError::UnknownObject(o))
        );

        deliver(
            &repo,
            Message::CreateObjectView {
                object_id: o,
                class_id: ClassId(0),
                field_values: vec![Value::Bool(false).into()],
            },
        );
        assert!(repo.has_view(o));
        assert_eq!(repo.send_field(o, "open", Value::Bool(true).into()), Ok(()));
    }

    #[test]
    fn test_record_is_forgotten_once_idle() {
        let repo = repository();
        let o = ObjectId(5);
        deliver(&repo, Message::BecomeOwner { object_id: o });
        deliver(&repo, Message::RevokeOwner { object_id: o });
        assert!(!repo.is_owner(o));
        assert_eq!(
            repo.send_field(o, "open", Value::Bool(true).into()),
            Err(RepositoryError::UnknownObject(o))
        );
    }

    #[test]
    fn test_unexpected_creation_reply_is_ignored() {
        let repo = repository();
        deliver(
            &repo,
            Message::ObjectCreated {
                object_id: ObjectId(1),
                request_token: RequestToken(42),
            },
        );
        assert_eq!(repo.pending_creations(), 0);
        assert_eq!(repo.view_count(), 0);
    }

    #[test]
    fn test_creation_record_is_dropped_when_unclaimed() {
        let repo = repository();
        let token = repo
            .create_object("door", vec![Value::Bool(false).into()], |_, _| {})
            .unwrap();
        deliver(
            &repo,
            Message::ObjectCreated {
                object_id: ObjectId(3),
                request_token: token,
            },
        );
        assert_eq!(
            repo.send_field(ObjectId(3), "open", Value::Bool(true).into()),
            Err(RepositoryError::UnknownObject(ObjectId(3)))
        );
    }

    #[test]
    fn test_creation_record_survives_a_designation_from_the_callback() {
        let repo = repository();
        let token = repo
            .create_object("door", vec![Value::Bool(false).into()], |repo, object_id| {
                repo.deliver(&Envelope::new(
                    SS,
                    ME,
                    Message::CreateAuthorityView { object_id },
                ));
            })
            .unwrap();
        deliver(
            &repo,
            Message::ObjectCreated {
                object_id: ObjectId(3),
                request_token: token,
            },
        );
        assert!(repo.is_authority(ObjectId(3)));
        assert_eq!(
            repo.send_field(ObjectId(3), "open", Value::Bool(true).into()),
            Ok(())
        );

        deliver(&repo, Message::DestroyAuthorityView { object_id: ObjectId(3) });
        assert_eq!(
            repo.send_field(ObjectId(3), "open", Value::Bool(true).into()),
            Err(RepositoryError::UnknownObject(ObjectId(3)))
        );
    }

    #[test]
    fn test_unknown_view_class_creates_nothing() {
        let repo = repository();
        deliver(
            &repo,
            Message::CreateObjectView {
                object_id: ObjectId(1),
                class_id: ClassId(9),
                field_values: vec![],
            },
        );
        assert!(!repo.has_view(ObjectId(1)));
    }
}
