//! Immutable views of the store delivered to subscribers.

use std::sync::Arc;

use crate::messaging::core::types::Conversation;

/// Shared handle to a snapshot.
pub type Snapshot = Arc<StoreSnapshot>;

/// The complete state of all conversations at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreSnapshot {
    version: u64,
    conversations: Vec<Conversation>,
}

impl StoreSnapshot {
    pub(crate) const fn new(version: u64, conversations: Vec<Conversation>) -> Self {
        Self {
            version,
            conversations,
        }
    }

    /// Monotonic counter, incremented by every applied mutation.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// All conversations in store order.
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Look up a conversation by id.
    #[must_use]
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Sum of every conversation's unread count.
    #[must_use]
    pub fn total_unread(&self) -> u64 {
        total_unread(&self.conversations)
    }
}

/// Sum the unread counters of `conversations`.
#[must_use]
pub fn total_unread(conversations: &[Conversation]) -> u64 {
    conversations
        .iter()
        .map(|c| u64::from(c.unread_count))
        .sum()
}
