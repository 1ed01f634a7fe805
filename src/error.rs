//! Error types for Cycler
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Cycler
#[derive(Debug, Error)]
pub enum CyclerError {
    /// Pipeline configuration missing or malformed
    #[error("Config error: {0}")]
    Config(String),

    /// Reviewer output could not be promoted into the next cycle
    #[error("Promotion error: {0}")]
    Promotion(String),

    /// Terminal setup, teardown or rendering error
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Cycler operations
pub type Result<T> = std::result::Result<T, CyclerError>;
