//! Bus-facing side of the state server: turns delivered envelopes into
//! engine operations.

use agora_director::Listener;
use agora_protocol::{Channel, Envelope, Message, ParticipantKind};

use crate::{StateError, StateServer};

impl Listener for StateServer {
    fn deliver(&self, envelope: &Envelope) {
        let from = envelope.from;
        tracing::debug!(
            %from,
            to = %envelope.to,
            kind = %envelope.message.kind(),
            "state server received"
        );

        let result = match &envelope.message {
            Message::CreateObject {
                class_id,
                field_values,
                request_token,
            } => self
                .create_object(*class_id, field_values.clone())
                .map(|object_id| {
                    self.director().send(
                        self.channel(),
                        from,
                        Message::ObjectCreated {
                            object_id,
                            request_token: *request_token,
                        },
                    );
                }),
            Message::DestroyObject { object_id } => self.destroy_object(*object_id).map(drop),
            Message::SetInterest { recipient, zone } => {
                self.set_interest(*recipient, *zone).map(drop)
            }
            Message::UnsetInterest { recipient, zone } => {
                self.unset_interest(*recipient, *zone).map(drop)
            }
            Message::AddToZone { object_id, zone } => {
                self.add_presence(*object_id, *zone).map(drop)
            }
            Message::RemoveFromZone { object_id, zone } => {
                self.remove_presence(*object_id, *zone).map(drop)
            }
            Message::SetAuthority {
                authority,
                object_id,
            } => self.set_authority(*authority, *object_id),
            Message::SetOwner { owner, object_id } => self.set_owner(*owner, *object_id),
            Message::SetField {
                object_id,
                field_id,
                value,
            } => self.set_field(from, *object_id, *field_id, value.clone()),
            Message::ClientDisconnected { channel } | Message::AiDisconnected { channel } => {
                self.drop_recipient(*channel).map(drop)
            }

            // Traffic the state server produces or that is meant for others.
            Message::AiConnected { .. }
            | Message::AiChannelAssigned { .. }
            | Message::ClientConnected { .. }
            | Message::DisconnectClient { .. }
            | Message::Connected { .. }
            | Message::Disconnected { .. }
            | Message::Disconnect
            | Message::Error { .. }
            | Message::ObjectCreated { .. }
            | Message::CreateObjectView { .. }
            | Message::DestroyObjectView { .. }
            | Message::CreateAuthorityView { .. }
            | Message::DestroyAuthorityView { .. }
            | Message::BecomeOwner { .. }
            | Message::RevokeOwner { .. }
            | Message::FieldUpdate { .. } => Ok(()),
        };

        if let Err(error) = result {
            self.report(from, &error);
        }
    }
}

impl StateServer {
    fn report(&self, from: Channel, error: &StateError) {
        if !error.is_policy_violation() {
            tracing::warn!(%from, %error, "request rejected");
            return;
        }

        tracing::warn!(%from, %error, "policy violation");
        if from.kind() == Some(ParticipantKind::Client) && !from.is_broadcast() {
            self.director().send(
                self.channel(),
                from,
                Message::DisconnectClient {
                    reason: error.to_string(),
                },
            );
        }
    }
}
