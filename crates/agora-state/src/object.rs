//! The state server's record of a distributed object.

use agora_protocol::{Channel, ClassId, FieldValue, ObjectId, Standing};

/// A live replicated object.
///
/// `fields` holds one value per entry of the class's storage map, in
/// storage-map order. Only the state server mutates it; everyone else gets
/// clones.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributedObject {
    id: ObjectId,
    class_id: ClassId,
    fields: Vec<FieldValue>,
    pub(crate) owner: Option<Channel>,
    pub(crate) authority: Option<Channel>,
}

impl DistributedObject {
    pub(crate) fn new(id: ObjectId, class_id: ClassId, fields: Vec<FieldValue>) -> Self {
        Self {
            id,
            class_id,
            fields,
            owner: None,
            authority: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Stored values in storage-map order.
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn owner(&self) -> Option<Channel> {
        self.owner
    }

    pub fn authority(&self) -> Option<Channel> {
        self.authority
    }

    /// `channel`'s relationship to this object.
    pub fn standing(&self, channel: Channel) -> Standing {
        Standing {
            is_owner: self.owner == Some(channel),
            is_authority: self.authority == Some(channel),
        }
    }

    pub(crate) fn store(&mut self, index: usize, value: FieldValue) {
        if let Some(slot) = self.fields.get_mut(index) {
            *slot = value;
        }
    }

    /// Clears owner and authority designations held by `channel`.
    pub(crate) fn release(&mut self, channel: Channel) {
        if self.owner == Some(channel) {
            self.owner = None;
        }
        if self.authority == Some(channel) {
            self.authority = None;
        }
    }
}
