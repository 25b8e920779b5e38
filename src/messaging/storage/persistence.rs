//! Versioned snapshot persistence for the conversation list.
//!
//! Best effort by contract: `load` never fails (it falls back to the default
//! set) and `save` reports failures as `false` after logging them.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

use crate::messaging::core::config::StorageConfig;
use crate::messaging::core::errors::{MessagingError, MessagingResult};
use crate::messaging::core::types::Conversation;
use crate::messaging::seed::default_conversations;
use crate::messaging::storage::backend::KeyValueStorage;

/// Fields every persisted conversation object must carry.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "id",
    "participant",
    "source",
    "messages",
    "lastMessage",
    "unreadCount",
];

/// Reads and writes the conversation snapshot under a single versioned key.
pub struct PersistenceAdapter {
    backend: Box<dyn KeyValueStorage>,
    key: String,
}

impl PersistenceAdapter {
    /// Create an adapter using the default snapshot key.
    #[must_use]
    pub fn new(backend: Box<dyn KeyValueStorage>) -> Self {
        Self::with_key(backend, StorageConfig::DEFAULT_SNAPSHOT_KEY)
    }

    /// Create an adapter using an explicit snapshot key.
    #[must_use]
    pub fn with_key(backend: Box<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// The key the snapshot lives under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted conversations, or the default set if nothing valid is stored.
    #[must_use]
    pub fn load(&self) -> Vec<Conversation> {
        match self.try_load() {
            Ok(Some(conversations)) => {
                debug!(
                    key = %self.key,
                    count = conversations.len(),
                    "loaded persisted conversations"
                );
                conversations
            }
            Ok(None) => {
                debug!(key = %self.key, "no persisted conversations, using defaults");
                default_conversations()
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "discarding persisted conversations");
                default_conversations()
            }
        }
    }

    /// Load the persisted conversations without falling back.
    ///
    /// Returns `Ok(None)` when no snapshot is stored.
    ///
    /// # Errors
    /// Returns an error if storage access fails or the snapshot is malformed.
    pub fn try_load(&self) -> MessagingResult<Option<Vec<Conversation>>> {
        self.backend
            .get(&self.key)?
            .map(|raw| decode_snapshot(&raw))
            .transpose()
    }

    /// Persist the full conversation list. Returns `false` if the write failed.
    pub fn save(&self, conversations: &[Conversation]) -> bool {
        match self.try_save(conversations) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    key = %self.key,
                    error = %err,
                    "failed to persist conversations, continuing in memory"
                );
                false
            }
        }
    }

    /// Persist the full conversation list.
    ///
    /// # Errors
    /// Returns an error if serialization or the storage write fails.
    pub fn try_save(&self, conversations: &[Conversation]) -> MessagingResult<()> {
        let raw = serde_json::to_string(conversations)?;
        self.backend.set(&self.key, &raw)
    }

    /// Erase the persisted snapshot.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub fn clear(&self) -> MessagingResult<()> {
        self.backend.remove(&self.key)
    }
}

/// Decode and validate a raw snapshot.
///
/// # Errors
/// Returns an error if the text is not JSON, is not a list of conversation
/// objects, or any conversation violates its invariants.
pub fn decode_snapshot(raw: &str) -> MessagingResult<Vec<Conversation>> {
    let value: Value = serde_json::from_str(raw)?;
    check_structure(&value)?;

    let conversations: Vec<Conversation> = serde_json::from_value(value)?;

    let mut seen = HashSet::new();
    let mut message_ids = HashSet::new();
    for conv in &conversations {
        if !seen.insert(conv.id.as_str()) {
            return Err(MessagingError::InvalidSnapshot(format!(
                "duplicate conversation id {}",
                conv.id
            )));
        }
        if let Some(message) = conv.messages.iter().find(|m| !message_ids.insert(m.id)) {
            return Err(MessagingError::InvalidSnapshot(format!(
                "duplicate message id {} in conversation {}",
                message.id, conv.id
            )));
        }
        conv.validate()?;
    }

    Ok(conversations)
}

fn check_structure(value: &Value) -> MessagingResult<()> {
    let items = value.as_array().ok_or_else(|| {
        MessagingError::InvalidSnapshot("snapshot is not a list".to_string())
    })?;

    for (index, item) in items.iter().enumerate() {
        let object = item.as_object().ok_or_else(|| {
            MessagingError::InvalidSnapshot(format!("entry {index} is not an object"))
        })?;
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
            return Err(MessagingError::InvalidSnapshot(format!(
                "entry {index} is missing field {missing}"
            )));
        }
    }

    Ok(())
}
