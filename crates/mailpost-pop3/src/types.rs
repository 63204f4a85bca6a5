//! POP3 message numbers.

use std::num::NonZeroU32;
use std::str::FromStr;

use crate::error::ParseError;

/// Message number as seen on the wire.
///
/// POP3 numbers messages from 1; the mailbox snapshot underneath indexes
/// from 0. This type is the only place the two are converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageNumber(pub NonZeroU32);

impl MessageNumber {
    /// Creates a new message number.
    ///
    /// Returns `None` if the value is 0.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the number for a 0-based snapshot index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index.checked_add(1)?).ok().and_then(Self::new)
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns the 0-based snapshot index.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl FromStr for MessageNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidMessageNumber(s.to_string()));
        }
        let n: u32 = s
            .parse()
            .map_err(|_| ParseError::InvalidMessageNumber(s.to_string()))?;
        Self::new(n).ok_or(ParseError::ZeroMessageNumber)
    }
}

impl std::fmt::Display for MessageNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let n: MessageNumber = "3".parse().unwrap();
        assert_eq!(n.get(), 3);
        assert_eq!(n.index(), 2);
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(
            "0".parse::<MessageNumber>(),
            Err(ParseError::ZeroMessageNumber)
        );
    }

    #[test]
    fn test_parse_invalid() {
        for input in ["", "-1", "+1", "one", "1.5", "99999999999"] {
            assert!(
                matches!(
                    input.parse::<MessageNumber>(),
                    Err(ParseError::InvalidMessageNumber(_))
                ),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_index() {
        assert_eq!(MessageNumber::from_index(0).unwrap().get(), 1);
        assert_eq!(MessageNumber::from_index(41).unwrap().to_string(), "42");
    }
}
