//! State server configuration.

use agora_protocol::Channel;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StateServerConfig
// ---------------------------------------------------------------------------

/// Configuration for one state server instance.
///
/// Every field has a default, so a `[state_server]` table in a config file
/// may name only what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateServerConfig {
    /// The instance's own channel. Must lie in the state-server range.
    pub channel: Channel,

    /// Inclusive range object ids are allocated from.
    pub object_ids: ObjectIdRange,

    /// When an object's owner or authority is reassigned, notify the
    /// previous holder (`RevokeOwner` / `DestroyAuthorityView`) before the
    /// new one hears about it.
    pub retract_previous_holder: bool,
}

impl Default for StateServerConfig {
    fn default() -> Self {
        Self {
            channel: Channel(100),
            object_ids: ObjectIdRange::default(),
            retract_previous_holder: true,
        }
    }
}

/// An inclusive range of object ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectIdRange {
    pub first: u64,
    pub last: u64,
}

impl Default for ObjectIdRange {
    fn default() -> Self {
        Self {
            first: 0,
            last: 999_999,
        }
    }
}
