//! Core messaging types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod types;

pub use config::{MessagingConfig, ServerConfig, StorageConfig};
pub use errors::{MessagingError, MessagingResult};
pub use ids::{ConversationId, ConversationIdError, MessageId};
pub use types::{Conversation, ConversationSource, Message, Participant};
