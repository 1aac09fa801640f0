//! End-to-end tests: repositories and a state server on one in-process
//! bus.

use std::sync::Arc;

use agora_director::MessageDirector;
use agora_protocol::{
    Channel, FieldDef, FieldPolicy, FieldValue, ObjectId, PrimitiveType, Schema, Value, ZoneId,
};
use agora_repository::{Repository, RepositoryError, Role, View, ViewContext, ViewRegistry};
use agora_state::{StateServer, StateServerConfig};
use parking_lot::Mutex;

// =========================================================================
// Fixture
// =========================================================================

const AI: Channel = Channel(1_000);
const CLIENT: Channel = Channel(100_001);
const PLAYING_FIELD: ZoneId = ZoneId(1);

type Log = Arc<Mutex<Vec<String>>>;

/// Writes every callback it receives into a shared log.
struct Logged {
    tag: &'static str,
    log: Log,
}

impl Logged {
    fn note(&self, ctx: &ViewContext<'_>, what: &str) {
        self.log
            .lock()
            .push(format!("{} {} {}", self.tag, ctx.object_id().0, what));
    }
}

impl View for Logged {
    fn on_created(&mut self, ctx: &mut ViewContext<'_>, fields: &[FieldValue]) {
        self.note(ctx, &format!("created/{}", fields.len()));
    }

    fn on_field_update(
        &mut self,
        ctx: &mut ViewContext<'_>,
        field: &FieldDef,
        value: &FieldValue,
        _from: Channel,
    ) {
        self.note(ctx, &format!("{}={:?}", field.name(), value.values()));
    }

    fn on_become_owner(&mut self, ctx: &mut ViewContext<'_>) {
        self.note(ctx, "owner");
    }

    fn on_authority_gained(&mut self, ctx: &mut ViewContext<'_>) {
        self.note(ctx, "authority");
    }

    fn on_destroyed(&mut self, ctx: &mut ViewContext<'_>) {
        self.note(ctx, "destroyed");
    }
}

fn schema() -> Schema {
    Schema::builder()
        .field(
            "avatar",
            "position",
            &[PrimitiveType::Float, PrimitiveType::Float],
            FieldPolicy::AUTHORITY_SEND | FieldPolicy::CLIENT_RECEIVE | FieldPolicy::RAM,
        )
        .field(
            "avatar",
            "move_command",
            &[PrimitiveType::Float, PrimitiveType::Float],
            FieldPolicy::OWNER_SEND | FieldPolicy::AUTHORITY_RECEIVE,
        )
        .build()
        .unwrap()
}

struct Network {
    bus: Arc<MessageDirector>,
    ss: Arc<StateServer>,
    ai: Arc<Repository>,
    client: Arc<Repository>,
    log: Log,
}

fn network() -> Network {
    let schema = Arc::new(schema());
    let bus = Arc::new(MessageDirector::new());
    let ss = Arc::new(
        StateServer::new(StateServerConfig::default(), Arc::clone(&schema), Arc::clone(&bus))
            .unwrap(),
    );
    ss.attach();

    let log: Log = Arc::default();
    let ai_log = Arc::clone(&log);
    let client_log = Arc::clone(&log);

    let ai = Arc::new(Repository::new(
        AI,
        Role::Authority,
        Arc::clone(&schema),
        Arc::clone(&bus),
        ViewRegistry::new().with("avatar", Role::Authority, move |_| Logged {
            tag: "ai",
            log: Arc::clone(&ai_log),
        }),
    ));
    let client = Arc::new(Repository::new(
        CLIENT,
        Role::Client,
        Arc::clone(&schema),
        Arc::clone(&bus),
        ViewRegistry::new().with("avatar", Role::Client, move |_| Logged {
            tag: "client",
            log: Arc::clone(&client_log),
        }),
    ));
    ai.attach();
    client.attach();

    Network {
        bus,
        ss,
        ai,
        client,
        log,
    }
}

fn origin() -> FieldValue {
    FieldValue::new(vec![Value::Float(0.0), Value::Float(0.0)])
}

/// The AI creates an avatar for the client, as a login service would.
fn spawn_avatar(net: &Network) -> ObjectId {
    let created: Arc<Mutex<Option<ObjectId>>> = Arc::default();
    let slot = Arc::clone(&created);
    net.ai
        .create_object("avatar", vec![origin()], move |repo, object_id| {
            repo.add_to_zone(object_id, PLAYING_FIELD);
            repo.set_authority(repo.channel(), object_id);
            repo.set_interest(CLIENT, PLAYING_FIELD);
            repo.set_owner(CLIENT, object_id);
            *slot.lock() = Some(object_id);
        })
        .unwrap();
    let id = created.lock().take();
    id.expect("creation callback ran")
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn test_creation_flow_builds_views_on_both_sides() {
    let net = network();
    let o = spawn_avatar(&net);

    assert_eq!(net.ai.pending_creations(), 0);
    assert!(net.ai.is_authority(o));
    assert!(!net.ai.has_view(o), "the AI never expressed interest");
    assert!(net.client.has_view(o));
    assert!(net.client.is_owner(o));

    let log = net.log.lock().clone();
    assert_eq!(
        log,
        vec![
            format!("client {} created/1", o.0),
            format!("client {} owner", o.0),
        ]
    );
}

#[test]
fn test_client_receives_all_viewer_updates() {
    let net = network();
    let o = spawn_avatar(&net);
    net.log.lock().clear();

    let position = FieldValue::new(vec![Value::Float(1.0), Value::Float(2.0)]);
    net.ai.send_field(o, "position", position).unwrap();

    assert_eq!(
        *net.log.lock(),
        vec![format!("client {} position=[Float(1.0), Float(2.0)]", o.0)]
    );
    assert_eq!(net.ss.object_fields(o).unwrap()[0].values()[0], Value::Float(1.0));
}

#[test]
fn test_send_field_refuses_fields_the_role_may_not_originate() {
    let net = network();
    let o = spawn_avatar(&net);

    assert_eq!(
        net.client.send_field(o, "position", origin()),
        Err(RepositoryError::NotPermitted {
            object: o,
            field: "position".into(),
        })
    );
    assert!(matches!(
        net.client.send_field(o, "nonexistent", origin()),
        Err(RepositoryError::UnknownField { .. })
    ));
    assert!(matches!(
        net.client.send_field(o, "move_command", FieldValue::from(Value::Int(1))),
        Err(RepositoryError::TypeMismatch { .. })
    ));
    assert!(matches!(
        net.client.send_field(ObjectId(77), "position", origin()),
        Err(RepositoryError::UnknownObject(ObjectId(77)))
    ));
}

#[test]
fn test_owner_command_reaches_authority_not_viewers() {
    let net = network();
    let o = spawn_avatar(&net);
    // The AI wants to see what it controls.
    net.ai.set_interest(AI, PLAYING_FIELD);
    net.log.lock().clear();

    let command = FieldValue::new(vec![Value::Float(1.0), Value::Float(0.0)]);
    net.client.send_field(o, "move_command", command).unwrap();

    assert_eq!(
        *net.log.lock(),
        vec![format!("ai {} move_command=[Float(1.0), Float(0.0)]", o.0)]
    );
}

#[test]
fn test_leaving_the_zone_destroys_the_view() {
    let net = network();
    let o = spawn_avatar(&net);
    net.log.lock().clear();

    net.ai.unset_interest(CLIENT, PLAYING_FIELD);
    assert!(!net.client.has_view(o));
    // Still the owner, so the record survives the view.
    assert!(net.client.is_owner(o));
    assert_eq!(*net.log.lock(), vec![format!("client {} destroyed", o.0)]);
    assert_eq!(net.client.view_count(), 0);
}

#[test]
fn test_destroying_the_object_clears_every_designation() {
    let net = network();
    let o = spawn_avatar(&net);

    net.ai.destroy_object(o);

    assert_eq!(net.ss.object_count(), 0);
    assert!(!net.client.has_view(o));
    assert!(!net.client.is_owner(o));
    assert!(!net.ai.is_authority(o));
    assert!(matches!(
        net.ai.send_field(o, "position", origin()),
        Err(RepositoryError::UnknownObject(_))
    ));
    assert!(matches!(
        net.client.send_field(o, "move_command", origin()),
        Err(RepositoryError::UnknownObject(_))
    ));
}

#[test]
fn test_unknown_class_is_refused_locally() {
    let net = network();
    assert_eq!(
        net.ai.create_object("dragon", vec![], |_, _| {}),
        Err(RepositoryError::UnknownClass("dragon".into()))
    );
    assert_eq!(net.bus.subscriber_count(Channel::ALL_STATE_SERVERS), 1);
}

/// Moves the object as soon as it appears, if this side controls it.
struct Echo;

impl View for Echo {
    fn on_created(&mut self, ctx: &mut ViewContext<'_>, _fields: &[FieldValue]) {
        if ctx.is_authority() {
            let corner = FieldValue::new(vec![Value::Float(9.0), Value::Float(9.0)]);
            ctx.send_field("position", corner);
        }
    }
}

#[test]
fn test_view_requests_run_after_the_lock_is_released() {
    let schema = Arc::new(schema());
    let bus = Arc::new(MessageDirector::new());
    let ss = Arc::new(
        StateServer::new(StateServerConfig::default(), Arc::clone(&schema), Arc::clone(&bus))
            .unwrap(),
    );
    ss.attach();
    let ai = Arc::new(Repository::new(
        AI,
        Role::Authority,
        Arc::clone(&schema),
        Arc::clone(&bus),
        ViewRegistry::new().with("avatar", Role::Authority, |_| Echo),
    ));
    ai.attach();

    let avatar = schema.class_by_name("avatar").unwrap().id();
    let o = ss.create_object(avatar, vec![origin()]).unwrap();
    ss.set_authority(AI, o).unwrap();
    ss.add_presence(o, ZoneId(0)).unwrap();
    ss.set_interest(AI, ZoneId(0)).unwrap();

    assert_eq!(
        ss.object_fields(o).unwrap()[0],
        FieldValue::new(vec![Value::Float(9.0), Value::Float(9.0)])
    );
}
