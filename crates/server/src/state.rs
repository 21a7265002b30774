//! Application state shared across handlers.

use crate::notify::Notifier;
use courier_cache::ResponseCache;
use courier_core::config::AppConfig;
use courier_metadata::MetadataStore;
use courier_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Update-check response cache (optional).
    pub cache: Option<Arc<dyn ResponseCache>>,
    /// Release notification sink.
    pub notifier: Notifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Panics
    ///
    /// Panics if storage configuration validation fails.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        cache: Option<Arc<dyn ResponseCache>>,
        notifier: Notifier,
    ) -> Self {
        if let Err(error) = config.storage.validate() {
            panic!("Invalid storage configuration: {}", error);
        }

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            cache,
            notifier,
        }
    }

    /// Base URL prepended to object keys in client-facing download links.
    pub fn public_endpoint(&self) -> &str {
        self.config.storage.public_endpoint()
    }
}
