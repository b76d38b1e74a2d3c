//! Errors raised while bringing a strategy or transport online

use crate::config::ConfigError;

/// Setup errors. Any of these during loop setup aborts the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Setup cancelled")]
    Cancelled,
}
