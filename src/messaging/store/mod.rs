//! Conversation store and the snapshots it publishes.

pub mod core;
pub mod snapshot;

pub use self::core::ConversationStore;
pub use snapshot::{Snapshot, StoreSnapshot, total_unread};
