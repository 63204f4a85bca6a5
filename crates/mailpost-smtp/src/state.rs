//! SMTP session states.
//!
//! The states follow the RFC 5321 mail transaction:
//! - `Initial`: connected, waiting for HELO/EHLO
//! - `Greeted`: ready for MAIL
//! - `HasSender`: MAIL accepted, waiting for RCPT
//! - `HasRecipients`: at least one RCPT accepted, DATA allowed
//! - `Terminated`: QUIT received or the stream ended

use mailpost_core::RecipientSet;

use crate::types::Address;

/// Where a session is in the mail transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, not greeted yet.
    #[default]
    Initial,
    /// Greeted; no transaction in progress.
    Greeted,
    /// Sender accepted.
    HasSender,
    /// One or more recipients accepted.
    HasRecipients,
    /// Session is over.
    Terminated,
}

impl SessionState {
    /// Returns `true` once HELO/EHLO has been received.
    #[must_use]
    pub const fn is_greeted(self) -> bool {
        !matches!(self, Self::Initial | Self::Terminated)
    }

    /// Returns `true` if MAIL is allowed.
    #[must_use]
    pub const fn can_mail(self) -> bool {
        matches!(self, Self::Greeted)
    }

    /// Returns `true` if RCPT is allowed.
    #[must_use]
    pub const fn can_rcpt(self) -> bool {
        matches!(self, Self::HasSender | Self::HasRecipients)
    }

    /// Returns `true` if DATA is allowed.
    #[must_use]
    pub const fn can_data(self) -> bool {
        matches!(self, Self::HasRecipients)
    }
}

/// Sender and recipients of the transaction in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse-path from MAIL.
    pub sender: Option<Address>,
    /// Local users from RCPT, in order.
    pub recipients: RecipientSet,
}

impl Envelope {
    /// Creates an empty envelope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the sender and every recipient.
    pub fn clear(&mut self) {
        self.sender = None;
        self.recipients.clear();
    }
}
