//! Application state.

use std::sync::Arc;

use shorts_registry::JobRegistry;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub registry: Arc<JobRegistry>,
}

impl AppState {
    pub fn new(config: ApiConfig, registry: Arc<JobRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
        }
    }
}
