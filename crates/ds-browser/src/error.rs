//! Error types for ds-browser

use thiserror::Error;

/// ds-browser error type
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser initialization failed: {0}")]
    Initialization(String),

    #[error("Browser already closed")]
    Closed,

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Tab error: {0}")]
    TabError(String),

    #[error("Cookie error: {0}")]
    Cookie(String),

    #[error("Storage error: {0}")]
    Storage(#[from] ds_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BrowserError>;
