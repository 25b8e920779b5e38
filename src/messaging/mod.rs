//! Conversation/messaging engine for the networking inbox.
//!
//! Organized into:
//! - `core`: Configuration, errors, IDs and the conversation/message records
//! - `storage`: Key/value backends and the versioned snapshot adapter
//! - `seed`: Built-in default conversations
//! - `store`: The canonical store and the snapshots it publishes
//! - `provider`: Application-lifetime container handing the store to surfaces

pub mod core;
pub mod provider;
pub mod seed;
pub mod storage;
pub mod store;

// Re-export commonly used types for convenience
pub use self::core::{
    Conversation, ConversationId, ConversationIdError, ConversationSource, Message, MessageId,
    MessagingConfig, MessagingError, MessagingResult, Participant, ServerConfig, StorageConfig,
};
pub use provider::{StoreFactory, StoreProvider};
pub use seed::default_conversations;
pub use storage::{KeyValueStorage, MemoryStorage, PersistenceAdapter, SqliteStorage};
pub use store::{ConversationStore, Snapshot, StoreSnapshot};
