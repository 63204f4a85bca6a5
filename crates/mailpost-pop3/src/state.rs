//! POP3 session states.

use mailpost_core::MessageList;

/// Where a session is in the RFC 1939 state machine.
///
/// The mailbox snapshot lives inside [`SessionState::Active`], so a loaded
/// mailbox and a transaction state always go together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for USER.
    #[default]
    Unauthenticated,

    /// USER named an existing account; waiting for PASS.
    UserKnown {
        /// Accepted user name.
        username: String,
    },

    /// Authenticated with the mailbox snapshot loaded.
    Active {
        /// Authenticated user name.
        username: String,
        /// Snapshot taken at authentication.
        mailbox: MessageList,
    },

    /// Session is over.
    Terminated,
}

impl SessionState {
    /// Returns `true` once PASS has succeeded.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Returns `true` if a mailbox snapshot is held.
    #[must_use]
    pub const fn is_mailbox_loaded(&self) -> bool {
        self.is_active()
    }

    /// Returns the user name accepted so far, if any.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::UserKnown { username } | Self::Active { username, .. } => Some(username),
            Self::Unauthenticated | Self::Terminated => None,
        }
    }

    /// Returns the mailbox snapshot in the transaction state.
    #[must_use]
    pub const fn mailbox(&self) -> Option<&MessageList> {
        match self {
            Self::Active { mailbox, .. } => Some(mailbox),
            _ => None,
        }
    }

    /// Returns the mailbox snapshot mutably in the transaction state.
    pub fn mailbox_mut(&mut self) -> Option<&mut MessageList> {
        match self {
            Self::Active { mailbox, .. } => Some(mailbox),
            _ => None,
        }
    }

    /// Takes the mailbox out of the session, leaving it terminated.
    pub fn terminate(&mut self) -> Option<(String, MessageList)> {
        match std::mem::replace(self, Self::Terminated) {
            Self::Active { username, mailbox } => Some((username, mailbox)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailpost_core::Message;

    fn active() -> SessionState {
        SessionState::Active {
            username: "alice".into(),
            mailbox: MessageList::new(vec![Message::new("0.mail", 10)]),
        }
    }

    #[test]
    fn test_default_state() {
        let state = SessionState::default();
        assert_eq!(state, SessionState::Unauthenticated);
        assert!(!state.is_active());
        assert!(state.username().is_none());
    }

    #[test]
    fn test_user_known() {
        let state = SessionState::UserKnown {
            username: "alice".into(),
        };
        assert_eq!(state.username(), Some("alice"));
        assert!(!state.is_mailbox_loaded());
        assert!(state.mailbox().is_none());
    }

    #[test]
    fn test_active_holds_mailbox() {
        let mut state = active();
        assert!(state.is_active());
        assert!(state.is_mailbox_loaded());
        assert_eq!(state.mailbox().unwrap().count(), 1);
        state.mailbox_mut().unwrap().mark_deleted(0).unwrap();
        assert_eq!(state.mailbox().unwrap().count(), 0);
    }

    #[test]
    fn test_terminate() {
        let mut state = active();
        let (username, mailbox) = state.terminate().unwrap();
        assert_eq!(username, "alice");
        assert_eq!(mailbox.len(), 1);
        assert_eq!(state, SessionState::Terminated);
        assert!(state.terminate().is_none());
    }
}
