//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use formpilot_chat::SessionRegistry;
use formpilot_core::config::FormPilotConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FormPilotConfig>,
    /// Live conversation sessions.
    pub registry: Arc<SessionRegistry>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: FormPilotConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            start_time: Instant::now(),
        }
    }
}
