//! Recipient accumulation for a mail transaction.

/// Ordered list of local recipients collected during one transaction.
///
/// Duplicates are kept: a user named twice receives the message twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet(Vec<String>);

impl RecipientSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a recipient.
    pub fn push(&mut self, user: impl Into<String>) {
        self.0.push(user.into());
    }

    /// Removes every recipient.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Number of recipients, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no recipient has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over recipients in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for RecipientSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
