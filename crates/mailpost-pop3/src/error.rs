//! Error types for POP3 argument parsing.

/// Errors produced while parsing command arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Argument is not a decimal number.
    #[error("Invalid message number: {0}")]
    InvalidMessageNumber(String),

    /// Message numbers start at 1.
    #[error("Message number 0 does not exist")]
    ZeroMessageNumber,
}
