//! Everything guarded by the state server's lock.
//!
//! Recipients, zones, and objects share one [`RelationTable`]. Their ids
//! live in separate spaces (recipient `ch-0`, `zone-0` and `obj-0` are
//! three different things), so table elements are tagged with their kind.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use agora_protocol::{Channel, Envelope, Message, ObjectId, ZoneId};
use agora_relation::RelationTable;

use crate::{DistributedObject, StateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Column {
    Recipients,
    Zones,
    Objects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Node {
    Recipient(Channel),
    Zone(ZoneId),
    Object(ObjectId),
}

impl Node {
    fn column(self) -> Column {
        match self {
            Node::Recipient(_) => Column::Recipients,
            Node::Zone(_) => Column::Zones,
            Node::Object(_) => Column::Objects,
        }
    }
}

pub(crate) struct World {
    pub(crate) relation: RelationTable<Column, Node>,
    pub(crate) objects: HashMap<ObjectId, DistributedObject>,
}

impl World {
    pub(crate) fn new() -> Self {
        Self {
            relation: RelationTable::new([
                Column::Recipients,
                Column::Zones,
                Column::Objects,
            ]),
            objects: HashMap::new(),
        }
    }

    /// Adds `node` to its column unless it is already there.
    pub(crate) fn ensure(&mut self, node: Node) -> Result<(), StateError> {
        if !self.relation.contains(&node) {
            self.relation.add(node.column(), node)?;
        }
        Ok(())
    }

    /// Objects `recipient` sees: present in some zone it is interested in.
    pub(crate) fn seen_by(&self, recipient: Channel) -> BTreeSet<ObjectId> {
        self.relation
            .path(&Node::Recipient(recipient), &[Column::Zones, Column::Objects])
            .map(|nodes| objects_in(&nodes))
            .unwrap_or_default()
    }

    /// Recipients that see `object`.
    pub(crate) fn seers(&self, object: ObjectId) -> BTreeSet<Channel> {
        self.relation
            .path(&Node::Object(object), &[Column::Zones, Column::Recipients])
            .map(|nodes| recipients_in(&nodes))
            .unwrap_or_default()
    }

    /// Removes `zone` if nothing refers to it any more.
    pub(crate) fn prune_zone(&mut self, zone: ZoneId) {
        let node = Node::Zone(zone);
        let unused = self
            .relation
            .neighbors(&node)
            .is_ok_and(HashSet::is_empty);
        if unused {
            let _ = self.relation.remove(&node);
            tracing::trace!(%zone, "zone pruned");
        }
    }

    /// Prunes every zone among `nodes`.
    pub(crate) fn prune_zones(&mut self, nodes: &HashSet<Node>) {
        for node in nodes {
            if let Node::Zone(zone) = node {
                self.prune_zone(*zone);
            }
        }
    }

    /// Queues a `CreateObjectView` of `object` for `recipient`.
    pub(crate) fn queue_view(&self, outbox: &mut Outbox, recipient: Channel, object: ObjectId) {
        if let Some(record) = self.objects.get(&object) {
            outbox.push(
                recipient,
                Message::CreateObjectView {
                    object_id: object,
                    class_id: record.class_id(),
                    field_values: record.fields().to_vec(),
                },
            );
        }
    }

    pub(crate) fn count(&self, column: Column) -> usize {
        self.relation.members(&column).map_or(0, HashSet::len)
    }
}

fn objects_in(nodes: &HashSet<Node>) -> BTreeSet<ObjectId> {
    nodes
        .iter()
        .filter_map(|node| match node {
            Node::Object(id) => Some(*id),
            _ => None,
        })
        .collect()
}

fn recipients_in(nodes: &HashSet<Node>) -> BTreeSet<Channel> {
    nodes
        .iter()
        .filter_map(|node| match node {
            Node::Recipient(channel) => Some(*channel),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Envelopes produced while the lock is held, published after it is
/// released, in the order they were queued.
pub(crate) struct Outbox {
    from: Channel,
    queue: VecDeque<Envelope>,
}

impl Outbox {
    pub(crate) fn new(from: Channel) -> Self {
        Self {
            from,
            queue: VecDeque::new(),
        }
    }

    /// Queues a message sent as the state server itself.
    pub(crate) fn push(&mut self, to: Channel, message: Message) {
        self.queue.push_back(Envelope::new(self.from, to, message));
    }

    /// Queues a message relayed on behalf of `from`.
    pub(crate) fn relay(&mut self, from: Channel, to: Channel, message: Message) {
        self.queue.push_back(Envelope::new(from, to, message));
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Envelope> + '_ {
        self.queue.drain(..)
    }
}
