//! Application state for connection service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::registry::ConnectionRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(config: AppConfig, registry: ConnectionRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
        }
    }
}
