//! `agora-server`: runs one Agora process from a TOML config.

use std::path::PathBuf;

use agora::{AgoraConfig, AgoraError, AgoraServer, init_logging};
use clap::Parser;

/// Agora distributed object server.
///
/// CLI values override settings loaded from the config file.
#[derive(Parser, Debug)]
#[command(name = "agora-server", version, about)]
struct Cli {
    /// Path to the TOML config. A missing file means all defaults.
    #[arg(short, long, default_value = "agora.toml")]
    config: PathBuf,

    /// Log filter (error, warn, info, debug, trace, or a full directive).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Override the client agent address.
    #[arg(long)]
    client_bind: Option<String>,

    /// Override the AI agent address.
    #[arg(long)]
    ai_bind: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut AgoraConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }
        if let Some(addr) = &self.client_bind {
            config.network.client_bind = addr.clone();
        }
        if let Some(addr) = &self.ai_bind {
            config.network.ai_bind = addr.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AgoraError> {
    let cli = Cli::parse();

    let found = cli.config.exists();
    let mut config = if found {
        AgoraConfig::load(&cli.config)?
    } else {
        AgoraConfig::default()
    };
    cli.apply(&mut config);
    init_logging(&config.logging)?;
    if !found {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let schema = config.schema()?;
    tracing::info!(classes = schema.len(), "schema loaded");

    AgoraServer::builder()
        .config(config)
        .build(schema)
        .await?
        .run()
        .await
}
