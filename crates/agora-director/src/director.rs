//! The message director: a routing table from channel to subscribers.
//!
//! ```text
//!   publish(env) ──lock──► snapshot subscribers[env.to] ──unlock──┐
//!                                                                │
//!                          ┌─────────────────────────────────────┘
//!                          ▼
//!               for each listener: listener.deliver(&env)
//! ```
//!
//! The registry lock is held only while the subscriber set is read or
//! changed, never while a listener runs. A listener can therefore publish,
//! subscribe, or unsubscribe from inside its own `deliver` without
//! deadlocking, and the snapshot it was picked from is not disturbed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use agora_protocol::{Channel, Envelope, Message};
use parking_lot::Mutex;

use crate::listener::ListenerRef;
use crate::{DirectorError, Listener};

/// The channel-addressed publish/subscribe bus.
///
/// One instance is created at server startup and shared by `Arc` with
/// every component that publishes or subscribes.
#[derive(Default)]
pub struct MessageDirector {
    subscribers: Mutex<HashMap<Channel, HashSet<ListenerRef>>>,
}

impl MessageDirector {
    /// Creates a bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Registers `listener` for deliveries to `channel`.
    ///
    /// Subscriptions are a set: subscribing the same listener twice is a
    /// no-op and it is still delivered to once. Returns `true` if the
    /// subscription is new.
    pub fn subscribe(&self, channel: Channel, listener: Arc<dyn Listener>) -> bool {
        let added = self
            .subscribers
            .lock()
            .entry(channel)
            .or_default()
            .insert(ListenerRef(listener));
        if added {
            tracing::debug!(%channel, "listener subscribed");
        }
        added
    }

    /// Removes `listener`'s subscription on `channel`.
    ///
    /// # Errors
    /// [`DirectorError::NotSubscribed`] if there was none.
    pub fn unsubscribe(
        &self,
        channel: Channel,
        listener: &Arc<dyn Listener>,
    ) -> Result<(), DirectorError> {
        let mut subscribers = self.subscribers.lock();
        let set = subscribers
            .get_mut(&channel)
            .ok_or(DirectorError::NotSubscribed(channel))?;
        if !set.remove(&ListenerRef(Arc::clone(listener))) {
            return Err(DirectorError::NotSubscribed(channel));
        }
        if set.is_empty() {
            subscribers.remove(&channel);
        }
        drop(subscribers);

        tracing::debug!(%channel, "listener unsubscribed");
        Ok(())
    }

    /// Removes every subscription `listener` holds. Returns how many.
    pub fn unsubscribe_all(&self, listener: &Arc<dyn Listener>) -> usize {
        let target = ListenerRef(Arc::clone(listener));
        let mut removed = 0;
        self.subscribers.lock().retain(|_, set| {
            if set.remove(&target) {
                removed += 1;
            }
            !set.is_empty()
        });
        removed
    }

    /// Whether `listener` is subscribed to `channel`.
    pub fn is_subscribed(&self, channel: Channel, listener: &Arc<dyn Listener>) -> bool {
        self.subscribers
            .lock()
            .get(&channel)
            .is_some_and(|set| set.contains(&ListenerRef(Arc::clone(listener))))
    }

    /// Number of listeners currently subscribed to `channel`.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.subscribers.lock().get(&channel).map_or(0, HashSet::len)
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Delivers `envelope` to every current subscriber of `envelope.to`.
    ///
    /// A channel with no subscribers is a silent drop. Returns the number of
    /// listeners the envelope was handed to.
    pub fn publish(&self, envelope: Envelope) -> usize {
        let snapshot: Vec<Arc<dyn Listener>> = match self.subscribers.lock().get(&envelope.to) {
            Some(set) => set.iter().map(|l| Arc::clone(&l.0)).collect(),
            None => Vec::new(),
        };

        tracing::trace!(
            from = %envelope.from,
            to = %envelope.to,
            kind = %envelope.message.kind(),
            listeners = snapshot.len(),
            "publish"
        );

        for listener in &snapshot {
            listener.deliver(&envelope);
        }
        snapshot.len()
    }

    /// Shorthand for `publish(Envelope::new(from, to, message))`.
    pub fn send(&self, from: Channel, to: Channel, message: Message) -> usize {
        self.publish(Envelope::new(from, to, message))
    }
}

impl std::fmt::Debug for MessageDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDirector")
            .field("channels", &self.subscribers.lock().len())
            .finish()
    }
}
