//! The message taxonomy and the routed envelope.
//!
//! Every message on the bus is one variant of the closed [`Message`] enum.
//! Handlers `match` on it exhaustively, so adding a message kind is a
//! compile error everywhere it is not yet handled.
//!
//! `#[serde(tag = "type")]` gives the internally tagged JSON shape:
//!
//! ```text
//! { "type": "SetInterest", "recipient": 100001, "zone": 0 }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Channel, ClassId, FieldId, FieldValue, ObjectId, RequestToken, ZoneId};

/// A routed message: who sent it, where it goes, and what it says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender's channel. Agents overwrite this with the connection's own
    /// channel, so it cannot be spoofed from the network.
    pub from: Channel,
    /// Destination channel.
    pub to: Channel,
    /// The payload.
    pub message: Message,
}

impl Envelope {
    pub fn new(from: Channel, to: Channel, message: Message) -> Self {
        Self { from, to, message }
    }
}

/// Every message kind that travels over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    // -- Connection lifecycle (generated by agents) --
    /// An AI connected; broadcast to all AIs.
    AiConnected { channel: Channel },
    /// An AI went away; broadcast to AIs and state servers.
    AiDisconnected { channel: Channel },
    /// Tells an AI connection its own channel.
    AiChannelAssigned { channel: Channel },
    /// A client connected; broadcast to all AIs.
    ClientConnected { channel: Channel },
    /// A client went away; broadcast to AIs and state servers.
    ClientDisconnected { channel: Channel },
    /// Forces the client on the destination channel off the network.
    DisconnectClient { reason: String },
    /// Tells a client connection it is on the network, and its channel.
    Connected { channel: Channel },
    /// Tells a client it is being disconnected.
    Disconnected { reason: String },
    /// A client asks to leave.
    Disconnect,
    /// Agent → connection: a request was rejected.
    Error { code: u16, message: String },

    // -- Administrative (to the state server) --
    /// Create an object of `class_id` with its stored field values.
    CreateObject {
        class_id: ClassId,
        field_values: Vec<FieldValue>,
        request_token: RequestToken,
    },
    /// Reply to the creator of an object.
    ObjectCreated {
        object_id: ObjectId,
        request_token: RequestToken,
    },
    /// Destroy an object, retracting every view of it.
    DestroyObject { object_id: ObjectId },
    /// Make `recipient` interested in `zone`.
    SetInterest { recipient: Channel, zone: ZoneId },
    /// Withdraw `recipient`'s interest in `zone`.
    UnsetInterest { recipient: Channel, zone: ZoneId },
    /// Place an object into a zone.
    AddToZone { object_id: ObjectId, zone: ZoneId },
    /// Take an object out of a zone.
    RemoveFromZone { object_id: ObjectId, zone: ZoneId },
    /// Designate the object's authority.
    SetAuthority { authority: Channel, object_id: ObjectId },
    /// Designate the object's owner.
    SetOwner { owner: Channel, object_id: ObjectId },

    // -- Views (from the state server) --
    /// The destination can now see the object.
    CreateObjectView {
        object_id: ObjectId,
        class_id: ClassId,
        field_values: Vec<FieldValue>,
    },
    /// The destination can no longer see the object.
    DestroyObjectView { object_id: ObjectId },
    /// The destination is now the object's authority.
    CreateAuthorityView { object_id: ObjectId },
    /// The destination is no longer the object's authority.
    DestroyAuthorityView { object_id: ObjectId },
    /// The destination now owns the object.
    BecomeOwner { object_id: ObjectId },
    /// The destination no longer owns the object.
    RevokeOwner { object_id: ObjectId },

    // -- Field traffic --
    /// A participant writes a field.
    SetField {
        object_id: ObjectId,
        field_id: FieldId,
        value: FieldValue,
    },
    /// A field changed; delivered per the field's propagation policy.
    FieldUpdate {
        object_id: ObjectId,
        field_id: FieldId,
        value: FieldValue,
    },
}

/// Payload-free discriminant of [`Message`], for logs and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    AiConnected,
    AiDisconnected,
    AiChannelAssigned,
    ClientConnected,
    ClientDisconnected,
    DisconnectClient,
    Connected,
    Disconnected,
    Disconnect,
    Error,
    CreateObject,
    ObjectCreated,
    DestroyObject,
    SetInterest,
    UnsetInterest,
    AddToZone,
    RemoveFromZone,
    SetAuthority,
    SetOwner,
    CreateObjectView,
    DestroyObjectView,
    CreateAuthorityView,
    DestroyAuthorityView,
    BecomeOwner,
    RevokeOwner,
    SetField,
    FieldUpdate,
}

impl Message {
    /// The message's kind.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::AiConnected { .. } => MessageKind::AiConnected,
            Message::AiDisconnected { .. } => MessageKind::AiDisconnected,
            Message::AiChannelAssigned { .. } => MessageKind::AiChannelAssigned,
            Message::ClientConnected { .. } => MessageKind::ClientConnected,
            Message::ClientDisconnected { .. } => MessageKind::ClientDisconnected,
            Message::DisconnectClient { .. } => MessageKind::DisconnectClient,
            Message::Connected { .. } => MessageKind::Connected,
            Message::Disconnected { .. } => MessageKind::Disconnected,
            Message::Disconnect => MessageKind::Disconnect,
            Message::Error { .. } => MessageKind::Error,
            Message::CreateObject { .. } => MessageKind::CreateObject,
            Message::ObjectCreated { .. } => MessageKind::ObjectCreated,
            Message::DestroyObject { .. } => MessageKind::DestroyObject,
            Message::SetInterest { .. } => MessageKind::SetInterest,
            Message::UnsetInterest { .. } => MessageKind::UnsetInterest,
            Message::AddToZone { .. } => MessageKind::AddToZone,
            Message::RemoveFromZone { .. } => MessageKind::RemoveFromZone,
            Message::SetAuthority { .. } => MessageKind::SetAuthority,
            Message::SetOwner { .. } => MessageKind::SetOwner,
            Message::CreateObjectView { .. } => MessageKind::CreateObjectView,
            Message::DestroyObjectView { .. } => MessageKind::DestroyObjectView,
            Message::CreateAuthorityView { .. } => MessageKind::CreateAuthorityView,
            Message::DestroyAuthorityView { .. } => MessageKind::DestroyAuthorityView,
            Message::BecomeOwner { .. } => MessageKind::BecomeOwner,
            Message::RevokeOwner { .. } => MessageKind::RevokeOwner,
            Message::SetField { .. } => MessageKind::SetField,
            Message::FieldUpdate { .. } => MessageKind::FieldUpdate,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_message_is_internally_tagged() {
        let msg = Message::SetInterest {
            recipient: Channel(100_001),
            zone: ZoneId(4),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "SetInterest");
        assert_eq!(json["recipient"], 100_001);
        assert_eq!(json["zone"], 4);
    }

    #[test]
    fn test_unit_variant_shape() {
        let json = serde_json::to_string(&Message::Disconnect).unwrap();
        assert_eq!(json, r#"{"type":"Disconnect"}"#);
    }

    #[test]
    fn test_create_object_view_carries_field_values() {
        let msg = Message::CreateObjectView {
            object_id: ObjectId(1),
            class_id: ClassId(0),
            field_values: vec![FieldValue::new(vec![
                Value::Float(1.5),
                Value::Float(-2.0),
            ])],
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: Message = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_envelope_shape() {
        let env = Envelope::new(
            Channel(1_000),
            Channel::ALL_STATE_SERVERS,
            Message::DestroyObject { object_id: ObjectId(9) },
        );
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();
        assert_eq!(json["from"], 1_000);
        assert_eq!(json["to"], 1);
        assert_eq!(json["message"]["type"], "DestroyObject");
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        let result: Result<Message, _> =
            serde_json::from_str(r#"{"type": "FlyToMoon"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Message::Disconnect.kind(), MessageKind::Disconnect);
        assert_eq!(
            Message::BecomeOwner { object_id: ObjectId(2) }.kind(),
            MessageKind::BecomeOwner
        );
        assert_eq!(MessageKind::FieldUpdate.to_string(), "FieldUpdate");
    }
}
