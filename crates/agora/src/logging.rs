//! Tracing subscriber setup for the server binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::AgoraError;
use crate::config::LoggingSettings;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `settings.level` when set. Fails if a subscriber
/// is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), AgoraError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let registry = tracing_subscriber::registry().with(filter);

    if settings.json {
        registry
            .with(fmt::layer().json().with_thread_ids(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()?;
    }

    tracing::info!(level = %settings.level, json = settings.json, "logging initialized");
    Ok(())
}
