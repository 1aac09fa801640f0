//! `AgoraServer` builder and run loop.
//!
//! Assembles one process: a message director, a state server attached to
//! it, and two agents (clients, AIs) bridging WebSocket connections onto
//! the bus.
//!
//! ```text
//!   clients ──ws──▶ client agent ─┐
//!                                 ├──▶ MessageDirector ◀──▶ StateServer
//!   AIs     ──ws──▶ AI agent     ─┘
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use agora_director::MessageDirector;
use agora_protocol::{ParticipantKind, Schema};
use agora_state::StateServer;

use crate::AgoraError;
use crate::agent::{Agent, AgentConfig};
use crate::config::AgoraConfig;

/// Builder for an [`AgoraServer`].
///
/// ```rust,no_run
/// use agora::prelude::*;
///
/// # async fn start() -> Result<(), AgoraError> {
/// let config = AgoraConfig::load("agora.toml")?;
/// let schema = config.schema()?;
/// let server = AgoraServer::builder().config(config).build(schema).await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct AgoraServerBuilder {
    config: AgoraConfig,
}

impl AgoraServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: AgoraConfig) -> Self {
        self.config = config;
        self
    }

    pub fn client_bind(mut self, addr: &str) -> Self {
        self.config.network.client_bind = addr.to_string();
        self
    }

    pub fn ai_bind(mut self, addr: &str) -> Self {
        self.config.network.ai_bind = addr.to_string();
        self
    }

    /// Binds both agents and attaches the state server.
    pub async fn build(self, schema: Schema) -> Result<AgoraServer, AgoraError> {
        let director = Arc::new(MessageDirector::new());
        let state_server = Arc::new(StateServer::new(
            self.config.state_server.clone(),
            Arc::new(schema),
            Arc::clone(&director),
        )?);

        let clients = Agent::bind(
            AgentConfig {
                kind: ParticipantKind::Client,
                bind: self.config.network.client_bind.clone(),
            },
            Arc::clone(&director),
        )
        .await?;
        let ais = Agent::bind(
            AgentConfig {
                kind: ParticipantKind::Ai,
                bind: self.config.network.ai_bind.clone(),
            },
            Arc::clone(&director),
        )
        .await?;

        state_server.attach();
        Ok(AgoraServer {
            director,
            state_server,
            clients,
            ais,
        })
    }
}

/// A bound Agora server. Call [`run`](Self::run) to start serving.
#[derive(Debug)]
pub struct AgoraServer {
    director: Arc<MessageDirector>,
    state_server: Arc<StateServer>,
    clients: Agent,
    ais: Agent,
}

impl AgoraServer {
    pub fn builder() -> AgoraServerBuilder {
        AgoraServerBuilder::new()
    }

    pub fn client_addr(&self) -> Result<SocketAddr, AgoraError> {
        self.clients.local_addr()
    }

    pub fn ai_addr(&self) -> Result<SocketAddr, AgoraError> {
        self.ais.local_addr()
    }

    pub fn director(&self) -> &Arc<MessageDirector> {
        &self.director
    }

    pub fn state_server(&self) -> &Arc<StateServer> {
        &self.state_server
    }

    /// Serves until Ctrl-C.
    pub async fn run(self) -> Result<(), AgoraError> {
        self.run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serves until `shutdown` completes, then stops accepting and detaches
    /// the state server from the bus.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), AgoraError> {
        tracing::info!(
            state_server = %self.state_server.channel(),
            classes = self.state_server.schema().len(),
            "agora server running"
        );

        let result = tokio::select! {
            result = self.clients.run() => result,
            result = self.ais.run() => result,
            () = shutdown => {
                tracing::info!("shutdown requested");
                Ok(())
            }
        };

        self.clients.shutdown().await?;
        self.ais.shutdown().await?;
        self.state_server.detach();
        tracing::info!("agora server stopped");
        result
    }
}
