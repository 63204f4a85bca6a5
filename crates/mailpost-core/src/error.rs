//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on a connection or on local storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mailbox name cannot be mapped to a storage directory.
    #[error("Invalid mailbox name: {0:?}")]
    InvalidMailbox(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
