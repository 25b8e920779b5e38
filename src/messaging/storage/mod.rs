//! Durable storage for the conversation snapshot.

pub mod backend;
pub mod persistence;

pub use backend::{KeyValueStorage, MemoryStorage, SqliteStorage};
pub use persistence::{PersistenceAdapter, REQUIRED_FIELDS, decode_snapshot};
