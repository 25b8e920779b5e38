//! The conversation store: sole owner and mutator of conversation state.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::messaging::core::ids::MessageId;
use crate::messaging::core::types::{Conversation, Message};
use crate::messaging::storage::persistence::PersistenceAdapter;
use crate::messaging::store::snapshot::{Snapshot, StoreSnapshot, total_unread};

/// Canonical holder of all conversations.
///
/// Every applied mutation writes through to the persistence adapter and only
/// then publishes a fresh [`StoreSnapshot`] to subscribers. Malformed requests
/// (unknown conversation, blank text) are logged no-ops.
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    persistence: PersistenceAdapter,
    /// `None` once the id space is exhausted; appends are then refused.
    next_message_id: Option<MessageId>,
    version: u64,
    updates: watch::Sender<Snapshot>,
}

impl ConversationStore {
    /// Create a store seeded from persisted data (or the default set).
    #[must_use]
    pub fn open(persistence: PersistenceAdapter) -> Self {
        let conversations = persistence.load();
        Self::with_conversations(persistence, conversations)
    }

    /// Create a store seeded with explicit conversations.
    ///
    /// Later duplicates of an id are dropped. Nothing is written until the
    /// first mutation.
    #[must_use]
    pub fn with_conversations(
        persistence: PersistenceAdapter,
        conversations: Vec<Conversation>,
    ) -> Self {
        let conversations = dedupe(conversations);
        let next_message_id = next_message_id_after(&conversations);
        let (updates, _) = watch::channel(Arc::new(StoreSnapshot::new(0, conversations.clone())));

        info!(
            conversations = conversations.len(),
            unread = total_unread(&conversations),
            "conversation store ready"
        );

        Self {
            conversations,
            persistence,
            next_message_id,
            version: 0,
            updates,
        }
    }

    /// Current state as an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.updates.borrow())
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

    /// Sum of unread counts, recomputed from canonical state.
    #[must_use]
    pub fn total_unread(&self) -> u64 {
        total_unread(&self.conversations)
    }

    /// Number of applied mutations since the store was created.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Register for change notifications.
    ///
    /// The receiver always holds the latest complete snapshot; snapshots are
    /// published in mutation order.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.updates.subscribe()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.updates.receiver_count()
    }

    /// Send a message from the local user.
    ///
    /// Returns the new message id, or `None` if the text is blank or the
    /// conversation does not exist.
    pub fn add_message(&mut self, conversation_id: &str, text: &str) -> Option<MessageId> {
        self.append(conversation_id, text, true, false)
    }

    /// Deliver a message from the counterpart.
    ///
    /// `is_open` tells whether a surface currently shows the conversation; if so
    /// the message counts as read immediately.
    pub fn receive_message(
        &mut self,
        conversation_id: &str,
        text: &str,
        is_open: bool,
    ) -> Option<MessageId> {
        self.append(conversation_id, text, false, is_open)
    }

    /// Reset a conversation's unread count. Idempotent.
    ///
    /// Returns `false` if the conversation does not exist.
    pub fn mark_read(&mut self, conversation_id: &str) -> bool {
        let Some(index) = self.position(conversation_id) else {
            warn!(conversation_id, "mark_read on unknown conversation ignored");
            return false;
        };

        let changed = self.conversations[index].mark_read();
        self.commit();
        debug!(conversation_id, changed, "conversation marked read");
        true
    }

    /// Erase persisted data and re-seed from storage, which now yields the
    /// default set. Subscribers receive the re-seeded snapshot.
    pub fn clear_local_data(&mut self) {
        if let Err(err) = self.persistence.clear() {
            warn!(error = %err, "failed to erase persisted conversations");
        }

        self.conversations = dedupe(self.persistence.load());
        self.next_message_id = self
            .next_message_id
            .zip(next_message_id_after(&self.conversations))
            .map(|(current, reseeded)| current.max(reseeded));
        self.publish();
        info!(
            conversations = self.conversations.len(),
            "local conversation data cleared"
        );
    }

    fn append(
        &mut self,
        conversation_id: &str,
        text: &str,
        from_me: bool,
        is_open: bool,
    ) -> Option<MessageId> {
        let text = text.trim();
        if text.is_empty() {
            debug!(conversation_id, "blank message ignored");
            return None;
        }
        let Some(index) = self.position(conversation_id) else {
            warn!(conversation_id, "message for unknown conversation ignored");
            return None;
        };

        let Some(id) = self.next_message_id else {
            warn!(conversation_id, "message ids exhausted, message ignored");
            return None;
        };
        self.next_message_id = id.checked_next();
        self.conversations[index].append(
            Message {
                id,
                text: text.to_string(),
                from_me,
                timestamp: Utc::now(),
            },
            is_open,
        );
        self.commit();

        debug!(conversation_id, message_id = %id, from_me, "message appended");
        Some(id)
    }

    fn position(&self, conversation_id: &str) -> Option<usize> {
        self.conversations
            .iter()
            .position(|c| c.id == conversation_id)
    }

    /// Write through, then notify.
    fn commit(&mut self) {
        self.persistence.save(&self.conversations);
        self.publish();
    }

    fn publish(&mut self) {
        self.version += 1;
        self.updates.send_replace(Arc::new(StoreSnapshot::new(
            self.version,
            self.conversations.clone(),
        )));
    }
}

fn dedupe(conversations: Vec<Conversation>) -> Vec<Conversation> {
    let mut seen = HashSet::new();
    conversations
        .into_iter()
        .filter(|conv| {
            let fresh = seen.insert(conv.id.clone());
            if !fresh {
                warn!(conversation_id = %conv.id, "duplicate conversation dropped");
            }
            fresh
        })
        .collect()
}

fn next_message_id_after(conversations: &[Conversation]) -> Option<MessageId> {
    conversations
        .iter()
        .flat_map(|c| c.messages.iter().map(|m| m.id))
        .max()
        .map_or(Some(MessageId::new(1)), MessageId::checked_next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::core::errors::MessagingResult;
    use crate::messaging::seed::default_conversations;
    use crate::messaging::storage::backend::{KeyValueStorage, MemoryStorage};

    fn open_store(storage: &MemoryStorage) -> ConversationStore {
        ConversationStore::open(PersistenceAdapter::new(Box::new(storage.clone())))
    }

    fn unread(store: &ConversationStore, id: &str) -> Option<u32> {
        store.conversation(id).map(|c| c.unread_count)
    }

    #[test]
    fn test_mark_read_then_send_scenario() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);
        assert_eq!(unread(&store, "c1"), Some(2));

        assert!(store.mark_read("c1"));
        assert_eq!(unread(&store, "c1"), Some(0));

        let before = store.conversation("c1").map_or(0, |c| c.messages.len());
        let id = store.add_message("c1", "hello");
        assert!(id.is_some());

        let c1 = store.conversation("c1");
        assert_eq!(c1.map(|c| c.messages.len()), Some(before + 1));
        assert_eq!(c1.map(|c| c.last_message.as_str()), Some("hello"));
        assert_eq!(
            c1.and_then(|c| c.messages.last()).map(|m| (m.from_me, m.id)),
            id.map(|id| (true, id))
        );
        assert_eq!(unread(&store, "c1"), Some(0));
    }

    #[test]
    fn test_add_message_never_changes_unread() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);

        for id in ["c1", "c2", "c3", "c4", "c5"] {
            let before = unread(&store, id);
            store.add_message(id, "following up");
            assert_eq!(unread(&store, id), before);
        }
    }

    #[test]
    fn test_unknown_conversation_is_a_no_op() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);
        let before = store.snapshot();

        assert_eq!(store.add_message("nonexistent", "hi"), None);
        assert!(!store.mark_read("nonexistent"));
        assert_eq!(store.receive_message("nonexistent", "hi", false), None);

        assert_eq!(store.snapshot(), before);
        assert_eq!(store.version(), 0);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_blank_text_is_a_no_op() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);
        let before = store.snapshot();

        assert_eq!(store.add_message("c1", "   \n\t"), None);
        assert_eq!(store.add_message("c1", ""), None);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_text_is_trimmed() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);

        store.add_message("c2", "  padded  ");
        assert_eq!(
            store.conversation("c2").map(|c| c.last_message.as_str()),
            Some("padded")
        );
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);

        for _ in 0..3 {
            assert!(store.mark_read("c2"));
            assert_eq!(unread(&store, "c2"), Some(0));
        }
    }

    #[test]
    fn test_receive_message_respects_open_flag() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);
        store.mark_read("c3");

        store.receive_message("c3", "are you there?", false);
        assert_eq!(unread(&store, "c3"), Some(1));

        store.receive_message("c3", "nevermind, I see you", true);
        assert_eq!(unread(&store, "c3"), Some(1));
        assert_eq!(
            store.conversation("c3").map(|c| c.last_message.as_str()),
            Some("nevermind, I see you")
        );
    }

    #[test]
    fn test_total_unread_matches_sum_after_mixed_operations() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);

        store.receive_message("c2", "ping", false);
        store.mark_read("c1");
        store.add_message("c4", "nice to meet you too");
        store.receive_message("c5", "deadline is Friday", false);
        store.receive_message("c5", "see you there", true);
        store.mark_read("nonexistent");

        let sum: u64 = store
            .conversations()
            .iter()
            .map(|c| u64::from(c.unread_count))
            .sum();
        assert_eq!(store.total_unread(), sum);
        assert_eq!(store.snapshot().total_unread(), sum);
    }

    #[test]
    fn test_messages_keep_insertion_order() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);

        let ids: Vec<_> = ["one", "two", "three"]
            .iter()
            .filter_map(|text| store.add_message("c4", text))
            .collect();
        assert_eq!(ids.len(), 3);

        let messages = store.conversation("c4").map(|c| c.messages.clone()).unwrap_or_default();
        let tail: Vec<_> = messages.iter().rev().take(3).rev().map(|m| m.id).collect();
        assert_eq!(tail, ids);
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(messages.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_new_message_ids_exceed_loaded_ones() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);
        let max_seeded = default_conversations()
            .iter()
            .flat_map(|c| c.messages.iter().map(|m| m.id))
            .max();

        let id = store.add_message("c1", "hi");
        assert!(id > max_seeded);
    }

    #[test]
    fn test_exhausted_message_ids_refuse_appends() {
        let mut conversations = default_conversations();
        if let Some(last) = conversations[0].messages.last_mut() {
            last.id = MessageId::new(u64::MAX);
        }
        let mut store = ConversationStore::with_conversations(
            PersistenceAdapter::new(Box::new(MemoryStorage::new())),
            conversations.clone(),
        );

        assert_eq!(store.add_message("c1", "a"), None);
        assert_eq!(store.receive_message("c2", "b", false), None);
        assert_eq!(store.conversations(), conversations.as_slice());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_mutations_write_through() -> MessagingResult<()> {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);
        store.add_message("c1", "persist me");

        let raw = storage
            .get(crate::messaging::core::config::StorageConfig::DEFAULT_SNAPSHOT_KEY)?
            .unwrap_or_default();
        assert!(raw.contains("persist me"));
        Ok(())
    }

    #[test]
    fn test_state_survives_reload() {
        let storage = MemoryStorage::new();
        let expected = {
            let mut store = open_store(&storage);
            store.mark_read("c1");
            store.add_message("c1", "hello");
            store.receive_message("c2", "ping", false);
            store.conversations().to_vec()
        };

        let reloaded = open_store(&storage);
        assert_eq!(reloaded.conversations(), expected.as_slice());
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let mut storage = MemoryStorage::with_quota(0);
        let mut store = open_store(&storage);

        let id = store.add_message("c1", "still here");
        assert!(id.is_some());
        assert_eq!(
            store.conversation("c1").map(|c| c.last_message.as_str()),
            Some("still here")
        );
        assert!(storage.is_empty());

        // Quota is per handle; reopen through an unbounded one.
        storage.set_quota(None);
        let reloaded = open_store(&storage);
        assert_eq!(reloaded.conversations(), default_conversations().as_slice());
    }

    #[test]
    fn test_subscribers_see_identical_snapshots() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);
        let mut badge = store.subscribe();
        let mut page = store.subscribe();
        assert_eq!(store.subscriber_count(), 2);

        store.mark_read("c1");

        assert!(badge.has_changed().unwrap_or(false));
        let badge_view = Arc::clone(&badge.borrow_and_update());
        let page_view = Arc::clone(&page.borrow_and_update());
        assert_eq!(badge_view.version(), 1);
        assert_eq!(badge_view, page_view);
        assert_eq!(badge_view.total_unread(), store.total_unread());
    }

    #[test]
    fn test_no_op_does_not_notify() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);
        let rx = store.subscribe();

        store.add_message("nonexistent", "hi");
        store.add_message("c1", "  ");
        assert!(!rx.has_changed().unwrap_or(true));
    }

    #[test]
    fn test_clear_local_data_restores_defaults() {
        let storage = MemoryStorage::new();
        let mut store = open_store(&storage);
        let rx = store.subscribe();
        store.mark_read("c1");
        let last_id = store.add_message("c1", "soon forgotten");
        assert!(!storage.is_empty());

        store.clear_local_data();

        assert!(storage.is_empty());
        assert_eq!(store.conversations(), default_conversations().as_slice());
        assert_eq!(rx.borrow().conversations(), default_conversations().as_slice());
        assert!(store.add_message("c2", "fresh start") > last_id);
    }

    #[test]
    fn test_duplicate_seed_ids_are_dropped() {
        let mut conversations = default_conversations();
        conversations.push(conversations[0].clone());

        let store = ConversationStore::with_conversations(
            PersistenceAdapter::new(Box::new(MemoryStorage::new())),
            conversations,
        );
        assert_eq!(store.conversations().len(), default_conversations().len());
    }
}
