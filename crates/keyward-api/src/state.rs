//! Application state management

use keyward_core::{AppConfig, AuthEngine};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Token lifecycle engine
    pub engine: Arc<AuthEngine>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, engine: Arc<AuthEngine>) -> Self {
        Self {
            config,
            engine,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
