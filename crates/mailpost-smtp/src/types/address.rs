//! Email address types.

use crate::error::ParseError;

/// Email address from an SMTP envelope path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self, ParseError> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(&self.0, |(local, _)| local)
    }

    /// Returns the part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }

    /// Validates an email address (basic validation).
    fn validate(addr: &str) -> Result<(), ParseError> {
        if addr.is_empty() {
            return Err(ParseError::InvalidAddress("Address cannot be empty".into()));
        }

        if addr.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ParseError::InvalidAddress(
                "Address cannot contain whitespace".into(),
            ));
        }

        let parts: Vec<&str> = addr.split('@').collect();
        if parts.len() != 2 {
            return Err(ParseError::InvalidAddress(
                "Address must have exactly one @".into(),
            ));
        }

        if parts[0].is_empty() || parts[1].is_empty() {
            return Err(ParseError::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("alice@example.com").unwrap();
        assert_eq!(addr.as_str(), "alice@example.com");
        assert_eq!(addr.local_part(), "alice");
        assert_eq!(addr.domain(), "example.com");
        assert_eq!(addr.to_string(), "alice@example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("alice.example.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_empty_parts() {
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("alice@").is_err());
    }

    #[test]
    fn test_invalid_address_two_ats() {
        assert!(Address::new("alice@relay@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_whitespace() {
        assert!(Address::new("alice smith@example.com").is_err());
    }
}
