//! Application-lifetime container for the conversation store.
//!
//! One provider is built at startup and handed to every presentation surface
//! (by `Arc`, never through a global). The store itself is created lazily on
//! first access, and every operation runs under one lock for its whole
//! mutate, persist, publish sequence, so all subscribers observe the same
//! total order of snapshots.

use std::sync::{Mutex, OnceLock, PoisonError};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::messaging::core::config::StorageConfig;
use crate::messaging::core::ids::MessageId;
use crate::messaging::core::types::Conversation;
use crate::messaging::storage::backend::{KeyValueStorage, MemoryStorage, SqliteStorage};
use crate::messaging::storage::persistence::PersistenceAdapter;
use crate::messaging::store::core::ConversationStore;
use crate::messaging::store::snapshot::Snapshot;

/// Deferred store constructor.
pub type StoreFactory = Box<dyn FnOnce() -> ConversationStore + Send>;

/// Lazily initialized owner of the single conversation store.
pub struct StoreProvider {
    factory: Mutex<Option<StoreFactory>>,
    store: OnceLock<Mutex<ConversationStore>>,
}

impl StoreProvider {
    /// Create a provider that builds its store with `factory` on first use.
    #[must_use]
    pub fn new<F>(factory: F) -> Self
    where
        F: FnOnce() -> ConversationStore + Send + 'static,
    {
        Self {
            factory: Mutex::new(Some(Box::new(factory))),
            store: OnceLock::new(),
        }
    }

    /// Create a provider backed by the `SQLite` file in `config`.
    ///
    /// If the database cannot be opened the store runs memory-only for the
    /// session.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        let config = config.clone();
        Self::new(move || {
            let backend: Box<dyn KeyValueStorage> = match SqliteStorage::open(&config) {
                Ok(storage) => {
                    info!(path = %config.sqlite_path.display(), "opened local storage");
                    Box::new(storage)
                }
                Err(err) => {
                    warn!(
                        path = %config.sqlite_path.display(),
                        error = %err,
                        "local storage unavailable, conversations will not survive a restart"
                    );
                    Box::new(MemoryStorage::new())
                }
            };
            ConversationStore::open(PersistenceAdapter::with_key(backend, config.snapshot_key))
        })
    }

    /// Create a provider over an explicit storage backend.
    #[must_use]
    pub fn with_storage<S>(storage: S) -> Self
    where
        S: KeyValueStorage + 'static,
    {
        Self::new(move || ConversationStore::open(PersistenceAdapter::new(Box::new(storage))))
    }

    /// Whether the store has been created yet.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.store.get().is_some()
    }

    /// Current state as an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.with_store(|store| store.snapshot())
    }

    /// Copy of one conversation.
    #[must_use]
    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.with_store(|store| store.conversation(id).cloned())
    }

    /// Sum of unread counts across all conversations.
    #[must_use]
    pub fn total_unread(&self) -> u64 {
        self.with_store(|store| store.total_unread())
    }

    /// Register for change notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.with_store(|store| store.subscribe())
    }

    /// See [`ConversationStore::add_message`].
    pub fn add_message(&self, conversation_id: &str, text: &str) -> Option<MessageId> {
        self.with_store(|store| store.add_message(conversation_id, text))
    }

    /// See [`ConversationStore::receive_message`].
    pub fn receive_message(
        &self,
        conversation_id: &str,
        text: &str,
        is_open: bool,
    ) -> Option<MessageId> {
        self.with_store(|store| store.receive_message(conversation_id, text, is_open))
    }

    /// See [`ConversationStore::mark_read`].
    pub fn mark_read(&self, conversation_id: &str) -> bool {
        self.with_store(|store| store.mark_read(conversation_id))
    }

    /// Erase persisted conversations; the store falls back to the default set.
    pub fn clear_local_data(&self) {
        self.with_store(ConversationStore::clear_local_data);
    }

    /// Run `f` with exclusive access to the store.
    ///
    /// Everything `f` does is observed by other callers as one step, so a
    /// mutation and a read of its result cannot be split by another writer.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut ConversationStore) -> R) -> R {
        let mut guard = self
            .store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn store(&self) -> &Mutex<ConversationStore> {
        self.store.get_or_init(|| {
            let factory = self
                .factory
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            let store = factory.map_or_else(
                || {
                    warn!("store factory missing, starting memory-only");
                    ConversationStore::open(PersistenceAdapter::new(Box::new(MemoryStorage::new())))
                },
                |factory| factory(),
            );
            Mutex::new(store)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::messaging::seed::default_conversations;

    #[test]
    fn test_store_is_created_lazily_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider = StoreProvider::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ConversationStore::open(PersistenceAdapter::new(Box::new(MemoryStorage::new())))
        });

        assert!(!provider.is_initialized());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let _ = provider.total_unread();
        let _ = provider.snapshot();
        assert!(provider.is_initialized());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_consumers_share_state() {
        let provider = Arc::new(StoreProvider::with_storage(MemoryStorage::new()));
        let widget = Arc::clone(&provider);
        let badge = Arc::clone(&provider);

        widget.add_message("c2", "sent from the widget");
        widget.mark_read("c1");

        assert_eq!(
            provider.conversation("c2").map(|c| c.last_message),
            Some("sent from the widget".to_string())
        );
        assert_eq!(badge.total_unread(), provider.snapshot().total_unread());
    }

    #[test]
    fn test_total_unread_tracks_operations() {
        let provider = StoreProvider::with_storage(MemoryStorage::new());
        let initial: u64 = default_conversations()
            .iter()
            .map(|c| u64::from(c.unread_count))
            .sum();
        assert_eq!(provider.total_unread(), initial);

        provider.receive_message("c3", "new lead", false);
        assert_eq!(provider.total_unread(), initial + 1);

        provider.mark_read("c1");
        assert_eq!(provider.total_unread(), initial - 1);
    }

    #[test]
    fn test_concurrent_writers_are_serialized() {
        let provider = Arc::new(StoreProvider::with_storage(MemoryStorage::new()));
        let rx = provider.subscribe();
        let before = provider.conversation("c1").map_or(0, |c| c.messages.len());

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    (0..25)
                        .filter_map(|n| provider.add_message("c1", &format!("w{worker} m{n}")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.extend(handle.join().unwrap_or_default());
        }

        assert_eq!(ids.len(), 100);
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.version(), 100);
        assert_eq!(
            snapshot.conversation("c1").map(|c| c.messages.len()),
            Some(before + 100)
        );
        assert_eq!(snapshot.conversation("c1").map(|c| c.unread_count), Some(2));
    }

    #[test]
    fn test_with_store_reads_its_own_write() {
        let provider = Arc::new(StoreProvider::with_storage(MemoryStorage::new()));
        let before = provider.total_unread();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    provider.with_store(|store| {
                        let id = store.receive_message("c3", &format!("lead {worker}"), false);
                        (id.is_some(), store.total_unread())
                    })
                })
            })
            .collect();

        let mut totals: Vec<u64> = handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .filter_map(|(applied, total)| applied.then_some(total))
            .collect();
        totals.sort_unstable();

        assert_eq!(totals, (1..=4).map(|n| before + n).collect::<Vec<_>>());
    }

    #[test]
    fn test_clear_local_data_reseeds_for_next_initialization() {
        let storage = MemoryStorage::new();
        let provider = StoreProvider::with_storage(storage.clone());
        provider.mark_read("c1");
        assert!(!storage.is_empty());

        provider.clear_local_data();
        assert!(storage.is_empty());
        assert_eq!(
            provider.snapshot().conversations(),
            default_conversations().as_slice()
        );

        let next_session = StoreProvider::with_storage(storage);
        assert_eq!(
            next_session.snapshot().conversations(),
            default_conversations().as_slice()
        );
    }

    #[test]
    fn test_from_config_falls_back_to_memory() {
        let config = StorageConfig {
            sqlite_path: std::path::PathBuf::from("/dev/null/not-a-dir/inbox.sqlite"),
            ..StorageConfig::default()
        };
        let provider = StoreProvider::from_config(&config);

        assert!(provider.add_message("c1", "works without disk").is_some());
        assert_eq!(
            provider.conversation("c1").map(|c| c.last_message),
            Some("works without disk".to_string())
        );
    }
}
