//! Error types for SMTP argument parsing.

/// Errors produced while parsing command arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Path does not start with the expected `FROM:` or `TO:`.
    #[error("Expected {0}:")]
    MissingKeyword(&'static str),

    /// Path is not enclosed in angle brackets.
    #[error("Path must be enclosed in <>")]
    MissingBrackets,
}
