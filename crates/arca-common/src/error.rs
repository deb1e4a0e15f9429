//! Error types for Arca

use thiserror::Error;

/// Result type alias for Arca operations
pub type Result<T> = std::result::Result<T, ArcaError>;

/// Main error type shared across the Arca workspace
#[derive(Error, Debug)]
pub enum ArcaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("The space \"{0}\" does not appear to be a staging space")]
    NotStagingSpace(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
