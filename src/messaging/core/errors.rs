//! Error types for the messaging subsystem.

use thiserror::Error;

use crate::messaging::core::ids::ConversationIdError;

/// Messaging subsystem error type.
///
/// None of these reach a presentation surface: store operations log them and
/// degrade to a safe default. They exist so the storage layer can propagate with `?`.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Malformed conversation identifier.
    #[error("invalid conversation id: {0}")]
    InvalidId(#[from] ConversationIdError),
    /// Persisted snapshot failed structural validation.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    /// Durable storage refused the write because of its size limit.
    #[error("storage quota exceeded: needed {needed} bytes, quota is {quota} bytes")]
    QuotaExceeded {
        /// Size of the rejected value in bytes.
        needed: usize,
        /// Configured quota in bytes.
        quota: usize,
    },
    /// `SQLite` storage error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;
