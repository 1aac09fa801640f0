//! Network transports for Agora agents.
//!
//! An agent accepts connections from a [`Transport`] and exchanges frames
//! over each [`Connection`]. Frames are opaque bytes here; the agent owns
//! the codec.
//!
//! A connection is read by one task and written by another (the writer
//! drains deliveries coming off the message director), so implementations
//! must not let a pending `recv` hold up `send`.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{DEFAULT_HANDSHAKE_TIMEOUT, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Identifies one accepted connection within its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts incoming connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next connection and completes its handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address the transport listens on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;

    /// Stops accepting. Later `accept` calls fail.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One peer. `send` and `recv` may run concurrently from different tasks.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame.
    async fn send(&self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame. `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
