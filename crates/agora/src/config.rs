//! Server configuration, loaded from TOML.
//!
//! Every section is optional; an empty file gives a server with no
//! distributed classes on the default addresses.
//!
//! ```toml
//! [network]
//! client_bind = "0.0.0.0:7199"
//! ai_bind = "127.0.0.1:7198"
//!
//! [state_server]
//! channel = 100
//! retract_previous_holder = true
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [classes.avatar.fields.position]
//! types = ["float", "float"]
//! policy = "AUTHORITY_SEND | CLIENT_RECEIVE | RAM"
//! ```

use std::path::{Path, PathBuf};

use agora_protocol::{Schema, SchemaDefinition, SchemaError};
use agora_state::StateServerConfig;
use serde::Deserialize;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The whole server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgoraConfig {
    pub network: NetworkSettings,
    pub state_server: StateServerConfig,
    pub logging: LoggingSettings,
    /// Distributed classes keyed by name.
    pub classes: SchemaDefinition,
}

impl AgoraConfig {
    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Builds the schema from `[classes]`.
    pub fn schema(&self) -> Result<Schema, SchemaError> {
        Schema::from_definitions(&self.classes)
    }
}

/// Where the agents listen.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Client agent address.
    pub client_bind: String,
    /// AI agent address. Keep it off public interfaces: AIs are trusted.
    pub ai_bind: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            client_bind: "127.0.0.1:7199".to_string(),
            ai_bind: "127.0.0.1:7198".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"agora_state=debug,info"`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use agora_protocol::{Channel, FieldPolicy};

    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AgoraConfig::from_toml("").unwrap();
        assert_eq!(config.network, NetworkSettings::default());
        assert_eq!(config.logging, LoggingSettings::default());
        assert_eq!(config.state_server, StateServerConfig::default());
        assert!(config.schema().unwrap().is_empty());
    }

    #[test]
    fn test_full_file() {
        let config = AgoraConfig::from_toml(
            r#"
            [network]
            client_bind = "0.0.0.0:9000"

            [state_server]
            channel = 101
            retract_previous_holder = false

            [logging]
            json = true

            [classes.avatar.fields.position]
            types = ["float", "float"]
            policy = "AUTHORITY_SEND | CLIENT_RECEIVE | RAM"

            [classes.avatar.fields.move_command]
            types = ["float", "float"]
            policy = "OWNER_SEND | AUTHORITY_RECEIVE"
            "#,
        )
        .unwrap();

        assert_eq!(config.network.client_bind, "0.0.0.0:9000");
        assert_eq!(config.network.ai_bind, NetworkSettings::default().ai_bind);
        assert_eq!(config.state_server.channel, Channel(101));
        assert!(!config.state_server.retract_previous_holder);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");

        let schema = config.schema().unwrap();
        let avatar = schema.class_by_name("avatar").unwrap();
        let position = avatar.field_by_name("position").unwrap();
        assert!(position.policy().contains(FieldPolicy::RAM));
        assert_eq!(avatar.storage_map(), &[position.id()]);
    }

    #[test]
    fn test_invalid_policy_is_a_schema_error() {
        let config = AgoraConfig::from_toml(
            r#"
            [classes.door.fields.open]
            types = ["bool"]
            policy = "CLIENT_SEND"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.schema(),
            Err(SchemaError::NoPropagation { .. })
        ));
    }

    #[test]
    fn test_unknown_policy_flag_is_a_parse_error() {
        let result = AgoraConfig::from_toml(
            r#"
            [classes.door.fields.open]
            types = ["bool"]
            policy = "EVERYONE"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = AgoraConfig::from_toml(include_str!("../../../agora.toml")).unwrap();
        let schema = config.schema().unwrap();
        let avatar = schema.class_by_name("avatar").unwrap();
        assert_eq!(avatar.fields().len(), 3);
        assert_eq!(avatar.storage_map().len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();
        let config = AgoraConfig::load(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = AgoraConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
