//! Error types for the core library.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// POP3 operation failed.
    #[error("POP3 error: {0}")]
    Pop3(#[from] mailfetch_pop3::Error),

    /// Mail store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
