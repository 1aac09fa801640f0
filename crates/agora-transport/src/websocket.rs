//! WebSocket transport over `tokio-tungstenite`.
//!
//! Each accepted stream is split into a sink and a stream half, each
//! behind its own async mutex. The reader task parks on the stream half
//! while the writer task uses the sink half freely.
//!
//! ```text
//!   client ──frames──▶ SplitStream ──recv()──▶ agent reader task
//!   client ◀──frames── SplitSink   ◀──send()── agent writer task
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Transport, TransportError};

type WsStream = WebSocketStream<TcpStream>;

fn io_error(
    kind: std::io::ErrorKind,
    error: tokio_tungstenite::tungstenite::Error,
) -> std::io::Error {
    std::io::Error::new(kind, error)
}

/// How long a peer may take to complete the WebSocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Listens for WebSocket connections on a TCP socket.
pub struct WebSocketTransport {
    listener: TcpListener,
    handshake_timeout: Duration,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl WebSocketTransport {
    /// Binds to `addr`. Port 0 picks a free port; see
    /// [`local_addr`](Transport::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local = listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr = %local, "websocket transport listening");
        Ok(Self {
            listener,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Bounds the handshake of each accepted socket. A peer that stalls
    /// past it is dropped and `accept` returns
    /// [`TransportError::HandshakeTimeout`].
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio::time::timeout(
            self.handshake_timeout,
            tokio_tungstenite::accept_async(stream),
        )
        .await
        .map_err(|_| TransportError::HandshakeTimeout(peer))?
        .map_err(|e| {
            TransportError::AcceptFailed(io_error(std::io::ErrorKind::ConnectionRefused, e))
        })?;

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "accepted websocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// One WebSocket peer.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Frames go out as text when they are UTF-8 (JSON always is), so
    /// browser clients can read them directly.
    async fn send(&self, frame: &[u8]) -> Result<(), Self::Error> {
        let message = match std::str::from_utf8(frame) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(frame.to_vec().into()),
        };
        self.sink.lock().await.send(message).await.map_err(|e| {
            TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // tungstenite answers pings itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io_error(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
