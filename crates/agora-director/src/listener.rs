//! The delivery side of the bus.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use agora_protocol::Envelope;

/// Something that receives envelopes published to the channels it is
/// subscribed to.
///
/// `deliver` is called synchronously from whichever thread published the
/// envelope, and never with a bus lock held. An implementation may
/// publish, subscribe, or unsubscribe from inside `deliver`.
///
/// It must not block for long: an agent forwarding to a socket should hand
/// the envelope to a queue (e.g. an unbounded `mpsc` sender) rather than
/// write inline.
pub trait Listener: Send + Sync + 'static {
    fn deliver(&self, envelope: &Envelope);
}

/// Any `Fn(&Envelope)` closure is a listener. Handy for tests and small
/// taps.
impl<F> Listener for F
where
    F: Fn(&Envelope) + Send + Sync + 'static,
{
    fn deliver(&self, envelope: &Envelope) {
        self(envelope)
    }
}

/// A subscriber entry, compared by the identity of the `Arc` allocation.
///
/// Two clones of the same `Arc<dyn Listener>` are the same subscriber; two
/// separately allocated listeners are different even if they compare equal
/// by value.
#[derive(Clone)]
pub(crate) struct ListenerRef(pub(crate) Arc<dyn Listener>);

impl ListenerRef {
    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ListenerRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ListenerRef {}

impl Hash for ListenerRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}
