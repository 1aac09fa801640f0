//! Integration tests for the message director: re-entrancy, snapshot
//! isolation, and concurrent publishers.

use std::sync::{Arc, Weak};

use agora_director::{Listener, MessageDirector};
use agora_protocol::{Channel, Envelope, Message, ObjectId};
use parking_lot::Mutex;

// =========================================================================
// Helpers
// =========================================================================

/// Records every envelope it receives.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Envelope>>,
}

impl Recorder {
    fn taken(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.seen.lock())
    }
}

impl Listener for Recorder {
    fn deliver(&self, envelope: &Envelope) {
        self.seen.lock().push(envelope.clone());
    }
}

fn destroy(from: u64, to: Channel, object: u64) -> Envelope {
    Envelope::new(
        Channel(from),
        to,
        Message::DestroyObject { object_id: ObjectId(object) },
    )
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn test_broadcast_reaches_every_subscriber() {
    let bus = MessageDirector::new();
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    bus.subscribe(Channel::ALL_AIS, a.clone());
    bus.subscribe(Channel::ALL_AIS, b.clone());

    assert_eq!(bus.publish(destroy(100, Channel::ALL_AIS, 1)), 2);
    assert_eq!(a.taken().len(), 1);
    assert_eq!(b.taken().len(), 1);
}

/// A listener that publishes to another channel while being delivered to.
struct Forwarder {
    bus: Weak<MessageDirector>,
    to: Channel,
}

impl Listener for Forwarder {
    fn deliver(&self, envelope: &Envelope) {
        if let Some(bus) = self.bus.upgrade() {
            bus.publish(Envelope::new(envelope.to, self.to, envelope.message.clone()));
        }
    }
}

#[test]
fn test_publish_from_inside_delivery_does_not_deadlock() {
    let bus = Arc::new(MessageDirector::new());
    let sink = Arc::new(Recorder::default());
    bus.subscribe(Channel(20), sink.clone());
    bus.subscribe(
        Channel(10),
        Arc::new(Forwarder {
            bus: Arc::downgrade(&bus),
            to: Channel(20),
        }),
    );

    bus.publish(destroy(1_000, Channel(10), 5));

    let seen = sink.taken();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].from, Channel(10));
}

/// Unsubscribes itself and a peer on first delivery.
struct Leaver {
    bus: Weak<MessageDirector>,
    me: Mutex<Option<Arc<dyn Listener>>>,
    peer: Arc<dyn Listener>,
    hits: Mutex<usize>,
}

impl Listener for Leaver {
    fn deliver(&self, envelope: &Envelope) {
        *self.hits.lock() += 1;
        let Some(bus) = self.bus.upgrade() else { return };
        if let Some(me) = self.me.lock().take() {
            let _ = bus.unsubscribe(envelope.to, &me);
            let _ = bus.unsubscribe(envelope.to, &self.peer);
        }
    }
}

#[test]
fn test_unsubscribe_during_delivery_keeps_snapshot() {
    let bus = Arc::new(MessageDirector::new());
    let peer = Arc::new(Recorder::default());
    let peer_dyn: Arc<dyn Listener> = peer.clone();

    let leaver = Arc::new(Leaver {
        bus: Arc::downgrade(&bus),
        me: Mutex::new(None),
        peer: Arc::clone(&peer_dyn),
        hits: Mutex::new(0),
    });
    let leaver_dyn: Arc<dyn Listener> = leaver.clone();
    *leaver.me.lock() = Some(Arc::clone(&leaver_dyn));

    bus.subscribe(Channel(30), Arc::clone(&leaver_dyn));
    bus.subscribe(Channel(30), Arc::clone(&peer_dyn));

    // Both were in the snapshot, so both hear the first message even though
    // the leaver removes the peer mid-delivery.
    assert_eq!(bus.publish(destroy(1_000, Channel(30), 1)), 2);
    assert_eq!(peer.taken().len(), 1);
    assert_eq!(*leaver.hits.lock(), 1);

    assert_eq!(bus.subscriber_count(Channel(30)), 0);
    assert_eq!(bus.publish(destroy(1_000, Channel(30), 2)), 0);
    assert!(peer.taken().is_empty());
}

#[test]
fn test_concurrent_publishers_lose_nothing() {
    let bus = Arc::new(MessageDirector::new());
    let sink = Arc::new(Recorder::default());
    bus.subscribe(Channel(50), sink.clone());

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let bus = Arc::clone(&bus);
            std::thread::spawn(move || {
                for i in 0..250 {
                    bus.publish(destroy(1_000 + t, Channel(50), i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let seen = sink.taken();
    assert_eq!(seen.len(), 1_000);
    // Each publisher's own messages arrive in the order it sent them.
    for t in 0..4u64 {
        let ids: Vec<u64> = seen
            .iter()
            .filter(|e| e.from == Channel(1_000 + t))
            .map(|e| match e.message {
                Message::DestroyObject { object_id } => object_id.0,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, (0..250).collect::<Vec<_>>());
    }
}
