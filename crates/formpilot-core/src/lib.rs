//! Shared domain types, configuration and errors for FormPilot.

pub mod config;
pub mod error;
pub mod types;

pub use config::FormPilotConfig;
pub use error::{FormPilotError, Result};
pub use types::*;
