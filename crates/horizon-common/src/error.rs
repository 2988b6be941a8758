//! Error types shared across Horizon crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, HorizonError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum HorizonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl HorizonError {
    /// Build a configuration error naming the offending setting
    pub fn invalid_setting(name: &str, value: &str) -> Self {
        Self::Config(format!("invalid value '{}' for {}", value, name))
    }
}
