//! Configuration for the messaging subsystem.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::messaging::core::errors::{MessagingError, MessagingResult};

/// Environment variable overriding [`StorageConfig::sqlite_path`].
pub const ENV_SQLITE_PATH: &str = "INBOX_SQLITE_PATH";
/// Environment variable overriding [`StorageConfig::table`].
pub const ENV_STORAGE_TABLE: &str = "INBOX_STORAGE_TABLE";
/// Environment variable overriding [`StorageConfig::snapshot_key`].
pub const ENV_SNAPSHOT_KEY: &str = "INBOX_SNAPSHOT_KEY";
/// Environment variable overriding [`ServerConfig::port`].
pub const ENV_PORT: &str = "INBOX_PORT";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Durable storage settings.
    pub storage: StorageConfig,
    /// HTTP surface settings.
    pub server: ServerConfig,
}

impl MessagingConfig {
    /// Build a configuration from process environment variables, falling back
    /// to defaults for anything unset.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_env() -> MessagingResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns an error if an override cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> MessagingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_SQLITE_PATH) {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(table) = lookup(ENV_STORAGE_TABLE) {
            config.storage.table = table;
        }
        if let Some(key) = lookup(ENV_SNAPSHOT_KEY) {
            config.storage.snapshot_key = key;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.server.port = port.trim().parse().map_err(|_| {
                MessagingError::InvalidConfig(format!("{ENV_PORT} is not a valid port: {port}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> MessagingResult<()> {
        if self.storage.snapshot_key.trim().is_empty() {
            return Err(MessagingError::InvalidConfig(
                "storage.snapshot_key must not be empty".to_string(),
            ));
        }

        // The table name is interpolated into SQL.
        let table = &self.storage.table;
        let valid_table = table
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_table {
            return Err(MessagingError::InvalidConfig(format!(
                "storage.table must be a plain SQL identifier, got {table:?}"
            )));
        }

        if self.storage.sqlite_path.as_os_str().is_empty() {
            return Err(MessagingError::InvalidConfig(
                "storage.sqlite_path must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(MessagingError::InvalidConfig(
                "server.port must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Durable storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database file.
    pub sqlite_path: PathBuf,
    /// Key/value table name.
    pub table: String,
    /// Versioned key holding the conversation snapshot.
    pub snapshot_key: String,
}

impl StorageConfig {
    /// Default snapshot key. Bump the version suffix on incompatible format changes;
    /// old snapshots are then ignored and the default set is used.
    pub const DEFAULT_SNAPSHOT_KEY: &'static str = "networking-inbox.conversations.v1";
    /// Default key/value table.
    pub const DEFAULT_TABLE: &'static str = "local_storage";
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("inbox.sqlite"),
            table: Self::DEFAULT_TABLE.to_string(),
            snapshot_key: Self::DEFAULT_SNAPSHOT_KEY.to_string(),
        }
    }
}

/// HTTP surface settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
}

impl ServerConfig {
    /// Default listening port.
    pub const DEFAULT_PORT: u16 = 3000;
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: Self::DEFAULT_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = MessagingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, ServerConfig::DEFAULT_PORT);
        assert_eq!(
            config.storage.snapshot_key,
            StorageConfig::DEFAULT_SNAPSHOT_KEY
        );
    }

    #[test]
    fn test_lookup_overrides() -> MessagingResult<()> {
        let config = MessagingConfig::from_lookup(lookup(&[
            (ENV_SQLITE_PATH, "/tmp/inbox-test.sqlite"),
            (ENV_STORAGE_TABLE, "kv"),
            (ENV_SNAPSHOT_KEY, "inbox.v2"),
            (ENV_PORT, "8080"),
        ]))?;

        assert_eq!(config.storage.sqlite_path, PathBuf::from("/tmp/inbox-test.sqlite"));
        assert_eq!(config.storage.table, "kv");
        assert_eq!(config.storage.snapshot_key, "inbox.v2");
        assert_eq!(config.server.port, 8080);
        Ok(())
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = MessagingConfig::from_lookup(lookup(&[(ENV_PORT, "not-a-port")]));
        assert!(matches!(result, Err(MessagingError::InvalidConfig(_))));

        let result = MessagingConfig::from_lookup(lookup(&[(ENV_PORT, "0")]));
        assert!(matches!(result, Err(MessagingError::InvalidConfig(_))));
    }

    #[test]
    fn test_table_name_must_be_identifier() {
        let mut config = MessagingConfig::default();
        config.storage.table = "kv; DROP TABLE x".to_string();
        assert!(config.validate().is_err());

        config.storage.table = "1kv".to_string();
        assert!(config.validate().is_err());

        config.storage.table = "_kv_2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_snapshot_key_is_rejected() {
        let mut config = MessagingConfig::default();
        config.storage.snapshot_key = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
