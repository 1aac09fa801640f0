//! Unified error type for the Agora server.

use agora_director::DirectorError;
use agora_protocol::{IdsExhausted, ParticipantKind, ProtocolError, SchemaError};
use agora_relation::RelationError;
use agora_repository::RepositoryError;
use agora_state::StateError;
use agora_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error wrapping every crate-specific error.
///
/// Each variant has a `#[from]` impl, so `?` converts sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum AgoraError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Director(#[from] DirectorError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An agent ran out of channels to hand to new connections.
    #[error("no free channels: {0}")]
    ChannelsExhausted(#[from] IdsExhausted),

    /// Agents accept AI and client connections only.
    #[error("cannot run an agent for {0} connections")]
    UnsupportedAgentKind(ParticipantKind),

    /// A global tracing subscriber was already installed.
    #[error("logging setup failed: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

#[cfg(test)]
mod tests {
    use agora_protocol::{Channel, ObjectId};

    use super::*;

    #[test]
    fn test_from_state_error_keeps_message() {
        let err: AgoraError = StateError::UnknownObject(ObjectId(7)).into();
        assert!(matches!(err, AgoraError::State(_)));
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: AgoraError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, AgoraError::Protocol(_)));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_director_error() {
        let err: AgoraError = DirectorError::NotSubscribed(Channel(5)).into();
        assert!(matches!(err, AgoraError::Director(_)));
    }

    #[test]
    fn test_from_exhausted_ids() {
        let err: AgoraError = IdsExhausted { first: 1, last: 2 }.into();
        assert!(matches!(err, AgoraError::ChannelsExhausted(_)));
    }

    #[test]
    fn test_unsupported_agent_kind_names_the_kind() {
        let err = AgoraError::UnsupportedAgentKind(ParticipantKind::StateServer);
        assert_eq!(err.to_string(), "cannot run an agent for state server connections");
    }
}
