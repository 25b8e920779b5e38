//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::messaging::core::config::MessagingConfig;
use crate::messaging::provider::StoreProvider;

/// Shared application state.
pub struct AppState {
    /// The single conversation store provider for this process.
    pub provider: Arc<StoreProvider>,
}

impl AppState {
    /// Create application state over an existing provider.
    #[must_use]
    pub fn new(provider: Arc<StoreProvider>) -> Arc<Self> {
        Arc::new(Self { provider })
    }

    /// Create application state with a provider built from `config`.
    #[must_use]
    pub fn from_config(config: &MessagingConfig) -> Arc<Self> {
        Self::new(Arc::new(StoreProvider::from_config(&config.storage)))
    }
}
