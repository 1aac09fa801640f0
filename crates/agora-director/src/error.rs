//! Error types for the message bus.

use agora_protocol::Channel;

/// Errors returned by [`MessageDirector`](crate::MessageDirector).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectorError {
    /// The listener holds no subscription on this channel.
    #[error("listener is not subscribed to {0}")]
    NotSubscribed(Channel),
}
