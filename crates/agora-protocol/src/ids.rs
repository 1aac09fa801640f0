//! Identity types: channels, objects, zones, classes, fields, and tokens.
//!
//! Every identifier is a newtype over an unsigned integer. They all
//! serialize as plain numbers (`#[serde(transparent)]`), so a `Channel(7)`
//! is `7` on the wire, but the compiler keeps a `ZoneId` from being passed
//! where an `ObjectId` is expected.
//!
//! Channels are the only addressing unit of the message bus. Disjoint
//! ranges are reserved for each kind of participant, and a handful of
//! singleton channels mean "everyone of kind X":
//!
//! ```text
//! 0              ALL_MESSAGE_DIRECTORS
//! 1              ALL_STATE_SERVERS
//! 2              ALL_AIS
//! 3              ALL_CLIENTS
//! 10..=99        message directors
//! 100..=999      state servers
//! 1000..=9999    AIs (logic hosts)
//! 100000..=999999 clients
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// An address on the message bus.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Channel(pub u64);

impl Channel {
    /// Broadcast to every message director.
    pub const ALL_MESSAGE_DIRECTORS: Channel = Channel(0);
    /// Broadcast to every state server.
    pub const ALL_STATE_SERVERS: Channel = Channel(1);
    /// Broadcast to every AI (logic host).
    pub const ALL_AIS: Channel = Channel(2);
    /// Broadcast to every client.
    pub const ALL_CLIENTS: Channel = Channel(3);

    /// Classifies this channel by the reserved range it falls into.
    ///
    /// Broadcast channels classify as the kind they broadcast to.
    /// Returns `None` for addresses outside every reserved range.
    pub fn kind(self) -> Option<ParticipantKind> {
        ParticipantKind::ALL.into_iter().find(|kind| {
            kind.broadcast() == self || kind.range().contains(self)
        })
    }

    /// Returns `true` if this is one of the four broadcast channels.
    pub fn is_broadcast(self) -> bool {
        ParticipantKind::ALL
            .into_iter()
            .any(|kind| kind.broadcast() == self)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ChannelRange / ParticipantKind
// ---------------------------------------------------------------------------

/// An inclusive range of channel numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange {
    /// First channel in the range.
    pub first: u64,
    /// Last channel in the range (inclusive).
    pub last: u64,
}

impl ChannelRange {
    /// Creates a range covering `first..=last`.
    pub const fn new(first: u64, last: u64) -> Self {
        Self { first, last }
    }

    /// Returns `true` if `channel` lies inside the range.
    pub fn contains(&self, channel: Channel) -> bool {
        (self.first..=self.last).contains(&channel.0)
    }

    /// Number of channels in the range.
    pub fn len(&self) -> u64 {
        self.last.saturating_sub(self.first).saturating_add(1)
    }

    /// Always `false`; ranges hold at least one channel.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ChannelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.first, self.last)
    }
}

/// The kinds of process that take part in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    /// A bus instance.
    MessageDirector,
    /// A state authority (interest/visibility engine).
    StateServer,
    /// A game-logic host, the designated authority for objects.
    Ai,
    /// A player's client connection.
    Client,
}

impl ParticipantKind {
    /// Every kind, in channel order.
    pub const ALL: [ParticipantKind; 4] = [
        ParticipantKind::MessageDirector,
        ParticipantKind::StateServer,
        ParticipantKind::Ai,
        ParticipantKind::Client,
    ];

    /// The channel range reserved for individual participants of this kind.
    pub const fn range(self) -> ChannelRange {
        match self {
            ParticipantKind::MessageDirector => ChannelRange::new(10, 99),
            ParticipantKind::StateServer => ChannelRange::new(100, 999),
            ParticipantKind::Ai => ChannelRange::new(1_000, 9_999),
            ParticipantKind::Client => ChannelRange::new(100_000, 999_999),
        }
    }

    /// The singleton channel that reaches every participant of this kind.
    pub const fn broadcast(self) -> Channel {
        match self {
            ParticipantKind::MessageDirector => Channel::ALL_MESSAGE_DIRECTORS,
            ParticipantKind::StateServer => Channel::ALL_STATE_SERVERS,
            ParticipantKind::Ai => Channel::ALL_AIS,
            ParticipantKind::Client => Channel::ALL_CLIENTS,
        }
    }
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParticipantKind::MessageDirector => "message director",
            ParticipantKind::StateServer => "state server",
            ParticipantKind::Ai => "AI",
            ParticipantKind::Client => "client",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Object, zone, class, field, token ids
// ---------------------------------------------------------------------------

/// Identifier of a distributed object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj-{}", self.0)
    }
}

/// An opaque grouping id joining recipient interest and object presence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ZoneId(pub u64);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone-{}", self.0)
    }
}

/// Index of a distributed class, assigned by sorted class name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class-{}", self.0)
    }
}

/// Index of a field within its class, assigned by sorted field name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field-{}", self.0)
    }
}

/// Correlates a `CreateObject` request with its `ObjectCreated` reply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RequestToken(pub u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_serializes_as_plain_number() {
        let json = serde_json::to_string(&Channel(100_001)).unwrap();
        assert_eq!(json, "100001");
    }

    #[test]
    fn test_broadcast_channels_classify_as_their_kind() {
        assert_eq!(Channel::ALL_AIS.kind(), Some(ParticipantKind::Ai));
        assert_eq!(
            Channel::ALL_CLIENTS.kind(),
            Some(ParticipantKind::Client)
        );
        assert!(Channel::ALL_STATE_SERVERS.is_broadcast());
        assert!(!Channel(100).is_broadcast());
    }

    #[test]
    fn test_channel_kind_by_range() {
        assert_eq!(Channel(10).kind(), Some(ParticipantKind::MessageDirector));
        assert_eq!(Channel(999).kind(), Some(ParticipantKind::StateServer));
        assert_eq!(Channel(1_000).kind(), Some(ParticipantKind::Ai));
        assert_eq!(Channel(123_456).kind(), Some(ParticipantKind::Client));
    }

    #[test]
    fn test_channel_outside_every_range_has_no_kind() {
        assert_eq!(Channel(5).kind(), None);
        assert_eq!(Channel(50_000).kind(), None);
        assert_eq!(Channel(1_000_000).kind(), None);
    }

    #[test]
    fn test_ranges_are_disjoint() {
        for a in ParticipantKind::ALL {
            for b in ParticipantKind::ALL {
                if a == b {
                    continue;
                }
                let (ra, rb) = (a.range(), b.range());
                assert!(ra.last < rb.first || rb.last < ra.first);
            }
        }
    }

    #[test]
    fn test_range_len() {
        assert_eq!(ParticipantKind::StateServer.range().len(), 900);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(Channel(7).to_string(), "ch-7");
        assert_eq!(ObjectId(3).to_string(), "obj-3");
        assert_eq!(ZoneId(0).to_string(), "zone-0");
        assert_eq!(ClassId(1).to_string(), "class-1");
        assert_eq!(FieldId(2).to_string(), "field-2");
        assert_eq!(RequestToken(9).to_string(), "req-9");
    }
}
