//! State shared with the HTTP endpoints.

use sigwarden_core::config::AppConfig;
use sigwarden_metadata::MetadataStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Trust store.
    pub metadata: Arc<dyn MetadataStore>,
}

impl AppState {
    pub fn new(config: AppConfig, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            config: Arc::new(config),
            metadata,
        }
    }
}
