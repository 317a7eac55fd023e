//! Application state.

use sessiond_core::{SessionConfig, SessionRegistry};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Session actor namespace
    pub registry: SessionRegistry,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, registry: SessionRegistry) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            registry,
            start_time: Instant::now(),
        })
    }

    /// Durations used when an initialize request omits them
    pub fn default_session_config(&self) -> SessionConfig {
        SessionConfig {
            max_duration: self.config.session.max_duration_ms,
            max_idle_time: self.config.session.max_idle_time_ms,
        }
    }
}
