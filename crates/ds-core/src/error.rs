//! Error types for ds-core

use thiserror::Error;

/// Main error type for ds-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fragment: {0}")]
    Fragment(String),
}

/// Result type alias for ds-core
pub type Result<T> = std::result::Result<T, Error>;
