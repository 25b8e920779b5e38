//! Durable key/value storage backends.
//!
//! The messaging core only needs string values under string keys, the same
//! contract a browser's local storage offers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::messaging::core::config::StorageConfig;
use crate::messaging::core::errors::{MessagingError, MessagingResult};

/// Minimal durable key/value storage.
pub trait KeyValueStorage: Send {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, key: &str) -> MessagingResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if storage access fails or the write is refused.
    fn set(&self, key: &str, value: &str) -> MessagingResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn remove(&self, key: &str) -> MessagingResult<()>;
}

/// `SQLite` implementation of key/value storage.
pub struct SqliteStorage {
    conn: Connection,
    table: String,
}

impl SqliteStorage {
    /// Open (or create) the database file described by `config`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(config: &StorageConfig) -> MessagingResult<Self> {
        if let Some(parent) = config
            .sqlite_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::open_path(&config.sqlite_path, &config.table)
    }

    /// Open a database file with an explicit table name.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open_path(path: &Path, table: &str) -> MessagingResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, table)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn open_in_memory(table: &str) -> MessagingResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, table)
    }

    fn init(conn: Connection, table: &str) -> MessagingResult<Self> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
             );"
        ))?;

        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }
}

impl KeyValueStorage for SqliteStorage {
    fn get(&self, key: &str) -> MessagingResult<Option<String>> {
        let table = &self.table;
        let value = self
            .conn
            .query_row(
                &format!("SELECT value FROM {table} WHERE key = ?1"),
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> MessagingResult<()> {
        let table = &self.table;
        let now_ms = Utc::now().timestamp_millis();
        self.conn.execute(
            &format!(
                "INSERT INTO {table} (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at"
            ),
            rusqlite::params![key, value, now_ms],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> MessagingResult<()> {
        let table = &self.table;
        self.conn.execute(
            &format!("DELETE FROM {table} WHERE key = ?1"),
            rusqlite::params![key],
        )?;
        Ok(())
    }
}

/// In-process storage.
///
/// Clones share the same underlying map, so a test can keep a handle and
/// hand another to a store, or "reload" by opening a second store on it.
/// Also serves as the memory-only fallback when the database cannot be opened.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Create an empty, unbounded storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty storage that refuses values larger than `quota` bytes.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota: Some(quota),
        }
    }

    /// Change the quota of this handle (other clones keep theirs).
    pub fn set_quota(&mut self, quota: Option<usize>) {
        self.quota = quota;
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> MessagingResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> MessagingResult<()> {
        if let Some(quota) = self.quota.filter(|quota| value.len() > *quota) {
            return Err(MessagingError::QuotaExceeded {
                needed: value.len(),
                quota,
            });
        }
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> MessagingResult<()> {
        self.lock().remove(key);
        Ok(())
    }
}
