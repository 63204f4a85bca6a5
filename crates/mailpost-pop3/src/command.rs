//! POP3 command parsing.
//!
//! A command line is a keyword, matched case-insensitively, optionally
//! followed by one whitespace-separated argument. Arguments are kept as
//! raw text; the session decides what a valid argument is, so that a
//! missing or malformed argument can be answered in the right state.

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - names the mailbox to open.
    User {
        /// User name, if given.
        username: Option<String>,
    },
    /// PASS - completes authentication for the named user.
    Pass {
        /// Password, if given.
        password: Option<String>,
    },
    /// STAT - message count and total size.
    Stat,
    /// LIST - scan listing of one or all messages.
    List {
        /// Message number argument, if given.
        msg: Option<String>,
    },
    /// RETR - sends a message.
    Retr {
        /// Message number argument, if given.
        msg: Option<String>,
    },
    /// DELE - flags a message for deletion.
    Dele {
        /// Message number argument, if given.
        msg: Option<String>,
    },
    /// UIDL - unique-id listing of one or all messages.
    Uidl {
        /// Message number argument, if given.
        msg: Option<String>,
    },
    /// NOOP - does nothing.
    Noop,
    /// RSET - clears every deletion flag.
    Rset,
    /// QUIT - ends the session.
    Quit,
    /// Anything else, including an empty line.
    Unknown {
        /// The keyword as received.
        keyword: String,
    },
}

impl Command {
    /// Parses a command line with its line terminator already stripped.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let keyword = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::to_string);

        match keyword.to_ascii_uppercase().as_str() {
            "USER" => Self::User { username: arg },
            "PASS" => Self::Pass { password: arg },
            "STAT" => Self::Stat,
            "LIST" => Self::List { msg: arg },
            "RETR" => Self::Retr { msg: arg },
            "DELE" => Self::Dele { msg: arg },
            "UIDL" => Self::Uidl { msg: arg },
            "NOOP" => Self::Noop,
            "RSET" => Self::Rset,
            "QUIT" => Self::Quit,
            _ => Self::Unknown {
                keyword: keyword.to_string(),
            },
        }
    }

    /// Returns the command keyword.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User { .. } => "USER",
            Self::Pass { .. } => "PASS",
            Self::Stat => "STAT",
            Self::List { .. } => "LIST",
            Self::Retr { .. } => "RETR",
            Self::Dele { .. } => "DELE",
            Self::Uidl { .. } => "UIDL",
            Self::Noop => "NOOP",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
            Self::Unknown { keyword } => keyword,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords_case_insensitive() {
        assert_eq!(Command::parse("stat"), Command::Stat);
        assert_eq!(Command::parse("Noop"), Command::Noop);
        assert_eq!(Command::parse("RSET"), Command::Rset);
        assert_eq!(Command::parse("quit"), Command::Quit);
    }

    #[test]
    fn test_parse_argument() {
        assert_eq!(
            Command::parse("USER alice"),
            Command::User {
                username: Some("alice".into())
            }
        );
        assert_eq!(
            Command::parse("retr   7  "),
            Command::Retr {
                msg: Some("7".into())
            }
        );
        assert_eq!(Command::parse("LIST"), Command::List { msg: None });
        assert_eq!(Command::parse("PASS"), Command::Pass { password: None });
    }

    #[test]
    fn test_parse_extra_tokens_ignored() {
        assert_eq!(
            Command::parse("DELE 1 2"),
            Command::Dele {
                msg: Some("1".into())
            }
        );
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            Command::parse("APOP alice abc"),
            Command::Unknown {
                keyword: "APOP".into()
            }
        );
        assert_eq!(
            Command::parse(""),
            Command::Unknown {
                keyword: String::new()
            }
        );
    }

    #[test]
    fn test_name() {
        assert_eq!(Command::parse("uidl 1").name(), "UIDL");
        assert_eq!(Command::parse("xtnd").name(), "xtnd");
    }
}
