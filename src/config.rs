//! Client Configuration
//!
//! Which relation endpoint the client manages, where the leader-shared copy
//! of the requested configuration lives, and where relation records are
//! persisted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Relation endpoint name (default: "db")
    #[serde(default = "default_relation_name")]
    pub relation_name: String,

    /// Leader-settings key holding the shared configuration (default: "interface.pgsql")
    #[serde(default = "default_leader_key")]
    pub leader_key: String,

    /// File for relation records; kept in memory when unset
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

fn default_relation_name() -> String {
    "db".to_string()
}

fn default_leader_key() -> String {
    "interface.pgsql".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relation_name: default_relation_name(),
            leader_key: default_leader_key(),
            state_file: None,
        }
    }
}

impl ClientConfig {
    /// Config for a named relation endpoint, other fields defaulted.
    pub fn for_relation(relation_name: impl Into<String>) -> Self {
        Self {
            relation_name: relation_name.into(),
            ..Default::default()
        }
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.relation_name.trim().is_empty() {
            return Err(ConfigError::Invalid("relation_name must not be empty".into()));
        }
        if self.leader_key.trim().is_empty() {
            return Err(ConfigError::Invalid("leader_key must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.relation_name, "db");
        assert_eq!(config.leader_key, "interface.pgsql");
        assert!(config.state_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("client.json");
        fs::write(
            &path,
            r#"{"relation_name": "analytics", "state_file": "/var/lib/rel.json"}"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.relation_name, "analytics");
        assert_eq!(config.leader_key, "interface.pgsql");
        assert_eq!(config.state_file, Some(PathBuf::from("/var/lib/rel.json")));
    }

    #[test]
    fn test_empty_relation_name_rejected() {
        let config = ClientConfig::for_relation("  ");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_errors() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            ClientConfig::load(tmp.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));

        let path = tmp.path().join("bad.json");
        fs::write(&path, r#"{"relation_nam": "db"}"#).unwrap();
        assert!(matches!(ClientConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
