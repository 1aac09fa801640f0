//! Agents: where network connections meet the message director.
//!
//! An agent listens on one transport and serves one kind of participant
//! (clients or AIs). For each connection it:
//!
//! ```text
//!   1. allocates a channel from the kind's range
//!   2. subscribes an outlet on that channel and on the kind's broadcast
//!      channel (bus → mpsc → writer task)
//!   3. greets the peer (Connected / AiChannelAssigned)
//!   4. announces the peer on ALL_AIS (ClientConnected / AiConnected)
//!   5. reads frames: decode → stamp `from` → check → publish
//!   6. on close: unsubscribe, release the channel mapping, and announce
//!      ClientDisconnected / AiDisconnected to ALL_AIS and ALL_STATE_SERVERS
//! ```
//!
//! AIs are trusted and may publish anything. Clients may only write
//! fields through a state server and ask to disconnect; anything else is
//! a protocol violation and ends the connection.

use std::sync::Arc;

use agora_director::{Listener, MessageDirector};
use agora_protocol::{
    Channel, Codec, Envelope, IdAllocator, JsonCodec, Message, ParticipantKind, ProtocolError,
};
use agora_relation::BiMap;
use agora_transport::{
    Connection, ConnectionId, Transport, TransportError, WebSocketConnection, WebSocketTransport,
};
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use crate::AgoraError;

/// Error code sent when a frame cannot be decoded.
pub const ERROR_MALFORMED: u16 = 400;
/// Error code sent before closing a client that broke the protocol.
pub const ERROR_FORBIDDEN: u16 = 403;

/// Which participants an agent serves, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub kind: ParticipantKind,
    pub bind: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            kind: ParticipantKind::Client,
            bind: "127.0.0.1:0".to_string(),
        }
    }
}

/// State shared by an agent's connection tasks.
struct Shared {
    kind: ParticipantKind,
    director: Arc<MessageDirector>,
    codec: JsonCodec,
    channels: IdAllocator,
    connections: Mutex<BiMap<ConnectionId, Channel>>,
}

/// Accepts connections of one participant kind and bridges them onto the
/// bus.
pub struct Agent {
    transport: WebSocketTransport,
    shared: Arc<Shared>,
}

impl Agent {
    /// Binds the agent's transport.
    ///
    /// # Errors
    /// [`AgoraError::UnsupportedAgentKind`] for kinds other than AI and
    /// client; transport errors if the address cannot be bound.
    pub async fn bind(
        config: AgentConfig,
        director: Arc<MessageDirector>,
    ) -> Result<Self, AgoraError> {
        if !matches!(config.kind, ParticipantKind::Ai | ParticipantKind::Client) {
            return Err(AgoraError::UnsupportedAgentKind(config.kind));
        }
        let transport = WebSocketTransport::bind(&config.bind).await?;
        let range = config.kind.range();
        Ok(Self {
            transport,
            shared: Arc::new(Shared {
                kind: config.kind,
                director,
                codec: JsonCodec::default(),
                channels: IdAllocator::new(range.first, range.last),
                connections: Mutex::new(BiMap::new()),
            }),
        })
    }

    pub fn kind(&self) -> ParticipantKind {
        self.shared.kind
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, AgoraError> {
        Ok(self.transport.local_addr()?)
    }

    /// Connections currently served.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.lock().len()
    }

    /// The channel assigned to a connection, if it is still open.
    pub fn channel_of(&self, connection: ConnectionId) -> Option<Channel> {
        self.shared.connections.lock().get(&connection)
    }

    /// Accept loop. Each connection runs on its own task. Returns once the
    /// transport is shut down.
    pub async fn run(&mut self) -> Result<(), AgoraError> {
        let addr = self.transport.local_addr()?;
        tracing::info!(kind = %self.shared.kind, %addr, "agent running");
        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        let id = conn.id();
                        if let Err(error) = serve(conn, shared).await {
                            tracing::debug!(%id, %error, "connection ended with error");
                        }
                    });
                }
                Err(TransportError::Shutdown) => return Ok(()),
                Err(error @ TransportError::HandshakeTimeout(_)) => {
                    tracing::warn!(kind = %self.shared.kind, %error, "peer dropped");
                }
                Err(error) => {
                    tracing::error!(kind = %self.shared.kind, %error, "accept failed");
                }
            }
        }
    }

    /// Stops accepting new connections.
    pub async fn shutdown(&self) -> Result<(), AgoraError> {
        Ok(self.transport.shutdown().await?)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("kind", &self.shared.kind)
            .field("connections", &self.connection_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Per-connection handling
// ---------------------------------------------------------------------------

/// Releases a connection's bus presence when its handler exits, including
/// on early return.
struct Registration {
    shared: Arc<Shared>,
    id: ConnectionId,
    channel: Channel,
    outlet: Arc<dyn Listener>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.shared.director.unsubscribe_all(&self.outlet);
        self.shared.connections.lock().remove(&self.id);
        let gone = match self.shared.kind {
            ParticipantKind::Ai => Message::AiDisconnected {
                channel: self.channel,
            },
            _ => Message::ClientDisconnected {
                channel: self.channel,
            },
        };
        for to in [Channel::ALL_AIS, Channel::ALL_STATE_SERVERS] {
            self.shared.director.send(self.channel, to, gone.clone());
        }
        tracing::info!(
            kind = %self.shared.kind,
            id = %self.id,
            channel = %self.channel,
            "participant disconnected"
        );
    }
}

async fn serve(conn: WebSocketConnection, shared: Arc<Shared>) -> Result<(), AgoraError> {
    let id = conn.id();
    let channel = Channel(shared.channels.allocate()?);
    shared.connections.lock().insert(id, channel)?;

    let (tx, rx) = mpsc::unbounded_channel::<Envelope>();
    let outlet: Arc<dyn Listener> = {
        let tx = tx.clone();
        Arc::new(move |envelope: &Envelope| {
            // A closed receiver means the writer is gone; the reader will
            // notice shortly.
            let _ = tx.send(envelope.clone());
        })
    };
    shared.director.subscribe(channel, Arc::clone(&outlet));
    shared
        .director
        .subscribe(shared.kind.broadcast(), Arc::clone(&outlet));
    let registration = Registration {
        shared: Arc::clone(&shared),
        id,
        channel,
        outlet,
    };

    // Greet first, so the peer learns its channel before any view traffic
    // the announcement may trigger.
    let (greeting, announcement) = match shared.kind {
        ParticipantKind::Ai => (
            Message::AiChannelAssigned { channel },
            Message::AiConnected { channel },
        ),
        _ => (
            Message::Connected { channel },
            Message::ClientConnected { channel },
        ),
    };
    let _ = tx.send(Envelope::new(channel, channel, greeting));
    shared.director.send(channel, Channel::ALL_AIS, announcement);
    tracing::info!(
        kind = %shared.kind,
        %id,
        %channel,
        peer = %conn.peer_addr(),
        "participant connected"
    );

    let conn = Arc::new(conn);
    let closed = Arc::new(Notify::new());
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        rx,
        shared.codec,
        shared.kind,
        Arc::clone(&closed),
    ));

    let result = read_loop(&conn, &shared, channel, &tx, &closed).await;

    // Dropping the last sender lets the writer drain and close.
    drop(tx);
    drop(registration);
    let _ = writer.await;
    result
}

/// Reads frames until the peer leaves, breaks the protocol, or the writer
/// closes the connection.
async fn read_loop(
    conn: &WebSocketConnection,
    shared: &Shared,
    channel: Channel,
    tx: &mpsc::UnboundedSender<Envelope>,
    closed: &Notify,
) -> Result<(), AgoraError> {
    loop {
        let frame = tokio::select! {
            _ = closed.notified() => return Ok(()),
            frame = conn.recv() => frame?,
        };
        let Some(frame) = frame else {
            tracing::debug!(%channel, "peer closed the connection");
            return Ok(());
        };

        let mut envelope = match shared.codec.decode(&frame) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::debug!(%channel, %error, "undecodable frame");
                let _ = tx.send(error_envelope(channel, ERROR_MALFORMED, &error));
                continue;
            }
        };
        envelope.from = channel;

        if let Err(error) = admit(shared.kind, &envelope) {
            tracing::warn!(%channel, kind = %envelope.message.kind(), %error, "protocol violation");
            let _ = tx.send(error_envelope(channel, ERROR_FORBIDDEN, &error));
            return Err(error.into());
        }
        if matches!(envelope.message, Message::Disconnect) {
            tracing::debug!(%channel, "peer asked to disconnect");
            return Ok(());
        }

        tracing::trace!(%channel, to = %envelope.to, kind = %envelope.message.kind(), "inbound");
        shared.director.publish(envelope);
    }
}

/// Encodes bus deliveries onto the connection. Closes the connection when
/// the queue ends or a client is told to disconnect.
async fn write_loop(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    codec: JsonCodec,
    kind: ParticipantKind,
    closed: Arc<Notify>,
) {
    while let Some(envelope) = rx.recv().await {
        let frame = match codec.encode(&envelope) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::error!(to = %envelope.to, %error, "cannot encode outbound envelope");
                continue;
            }
        };
        if let Err(error) = conn.send(&frame).await {
            tracing::debug!(to = %envelope.to, %error, "send failed");
            break;
        }
        if let Message::DisconnectClient { reason } = &envelope.message {
            if kind == ParticipantKind::Client {
                tracing::info!(channel = %envelope.to, %reason, "disconnecting client");
                break;
            }
        }
    }
    closed.notify_one();
    if let Err(error) = conn.close().await {
        tracing::trace!(%error, "close failed");
    }
}

/// Checks that a participant of `kind` may publish `envelope`.
pub(crate) fn admit(kind: ParticipantKind, envelope: &Envelope) -> Result<(), ProtocolError> {
    if kind != ParticipantKind::Client {
        return Ok(());
    }
    match &envelope.message {
        Message::Disconnect => Ok(()),
        Message::SetField { .. }
            if envelope.to == Channel::ALL_STATE_SERVERS
                || envelope.to.kind() == Some(ParticipantKind::StateServer) =>
        {
            Ok(())
        }
        Message::SetField { .. } => Err(ProtocolError::InvalidMessage(format!(
            "field writes must go to a state server, not {}",
            envelope.to
        ))),
        other => Err(ProtocolError::InvalidMessage(format!(
            "clients may not send {}",
            other.kind()
        ))),
    }
}

fn error_envelope(channel: Channel, code: u16, error: &ProtocolError) -> Envelope {
    Envelope::new(
        channel,
        channel,
        Message::Error {
            code,
            message: error.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use agora_protocol::{FieldId, FieldValue, ObjectId, Value, ZoneId};

    use super::*;

    const CLIENT: Channel = Channel(100_001);

    fn set_field(to: Channel) -> Envelope {
        Envelope::new(
            CLIENT,
            to,
            Message::SetField {
                object_id: ObjectId(1),
                field_id: FieldId(0),
                value: FieldValue::from(Value::Int(1)),
            },
        )
    }

    #[test]
    fn test_clients_may_write_fields_through_state_servers() {
        assert!(admit(ParticipantKind::Client, &set_field(Channel::ALL_STATE_SERVERS)).is_ok());
        assert!(admit(ParticipantKind::Client, &set_field(Channel(100))).is_ok());
        assert!(admit(ParticipantKind::Client, &set_field(Channel(1_000))).is_err());
        assert!(admit(ParticipantKind::Client, &set_field(Channel::ALL_CLIENTS)).is_err());
    }

    #[test]
    fn test_clients_may_not_send_admin_messages() {
        let envelope = Envelope::new(
            CLIENT,
            Channel::ALL_STATE_SERVERS,
            Message::SetInterest {
                recipient: CLIENT,
                zone: ZoneId(1),
            },
        );
        let err = admit(ParticipantKind::Client, &envelope).unwrap_err();
        assert!(err.to_string().contains("SetInterest"));

        let disconnect = Envelope::new(CLIENT, CLIENT, Message::Disconnect);
        assert!(admit(ParticipantKind::Client, &disconnect).is_ok());
    }

    #[test]
    fn test_ais_are_trusted() {
        let envelope = Envelope::new(
            Channel(1_000),
            Channel::ALL_STATE_SERVERS,
            Message::SetInterest {
                recipient: CLIENT,
                zone: ZoneId(1),
            },
        );
        assert!(admit(ParticipantKind::Ai, &envelope).is_ok());
    }

    #[tokio::test]
    async fn test_only_ai_and_client_agents_exist() {
        let config = AgentConfig {
            kind: ParticipantKind::StateServer,
            ..AgentConfig::default()
        };
        let result = Agent::bind(config, Arc::new(MessageDirector::new())).await;
        assert!(matches!(
            result,
            Err(AgoraError::UnsupportedAgentKind(ParticipantKind::StateServer))
        ));
    }
}
