//! SMTP command parsing.
//!
//! Only the verb is interpreted here. Path arguments are kept raw and
//! parsed by the session after it has checked that the command is
//! allowed in the current state.

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - identifies the client.
    Helo {
        /// Client domain, if given.
        domain: Option<String>,
    },
    /// EHLO - identifies the client (extended).
    Ehlo {
        /// Client domain, if given.
        domain: Option<String>,
    },
    /// MAIL - starts a transaction.
    Mail {
        /// Everything after the verb, e.g. `FROM:<a@b>`.
        args: String,
    },
    /// RCPT - adds a recipient.
    Rcpt {
        /// Everything after the verb, e.g. `TO:<a@b>`.
        args: String,
    },
    /// DATA - starts the message body.
    Data,
    /// RSET - aborts the transaction.
    Rset,
    /// VRFY - asks whether a user exists.
    Vrfy {
        /// Everything after the verb, if anything.
        arg: Option<String>,
    },
    /// NOOP - does nothing.
    Noop,
    /// QUIT - ends the session.
    Quit,
    /// A standard verb this server does not implement.
    NotImplemented {
        /// The verb, uppercased.
        verb: String,
    },
    /// Anything else, including an empty line.
    Unknown {
        /// The verb as received.
        verb: String,
    },
}

/// Verbs recognized but answered with 502.
const NOT_IMPLEMENTED: &[&str] = &["EXPN", "HELP", "TURN", "SEND", "SOML", "SAML"];

impl Command {
    /// Parses a command line with its line terminator already stripped.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        let upper = verb.to_ascii_uppercase();
        match upper.as_str() {
            "HELO" => Self::Helo { domain: arg },
            "EHLO" => Self::Ehlo { domain: arg },
            "MAIL" => Self::Mail {
                args: rest.to_string(),
            },
            "RCPT" => Self::Rcpt {
                args: rest.to_string(),
            },
            "DATA" => Self::Data,
            "RSET" => Self::Rset,
            "VRFY" => Self::Vrfy { arg },
            "NOOP" => Self::Noop,
            "QUIT" => Self::Quit,
            v if NOT_IMPLEMENTED.contains(&v) => Self::NotImplemented { verb: upper },
            _ => Self::Unknown {
                verb: verb.to_string(),
            },
        }
    }

    /// Returns the command verb.
    #[must_use]
    pub fn verb(&self) -> &str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::Mail { .. } => "MAIL",
            Self::Rcpt { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Vrfy { .. } => "VRFY",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
            Self::NotImplemented { verb } | Self::Unknown { verb } => verb,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(Command::parse("DATA"), Command::Data);
        assert_eq!(Command::parse("rset"), Command::Rset);
        assert_eq!(Command::parse("Noop"), Command::Noop);
        assert_eq!(Command::parse("QUIT"), Command::Quit);
    }

    #[test]
    fn test_parse_helo() {
        assert_eq!(
            Command::parse("HELO client.example.com"),
            Command::Helo {
                domain: Some("client.example.com".into())
            }
        );
        assert_eq!(Command::parse("ehlo"), Command::Ehlo { domain: None });
    }

    #[test]
    fn test_parse_mail_keeps_arguments() {
        assert_eq!(
            Command::parse("MAIL FROM: <alice@example.com> SIZE=100"),
            Command::Mail {
                args: "FROM: <alice@example.com> SIZE=100".into()
            }
        );
        assert_eq!(
            Command::parse("rcpt to:<bob@example.com>"),
            Command::Rcpt {
                args: "to:<bob@example.com>".into()
            }
        );
        assert_eq!(Command::parse("MAIL"), Command::Mail { args: String::new() });
    }

    #[test]
    fn test_parse_vrfy() {
        assert_eq!(
            Command::parse("VRFY Alice <alice@example.com>"),
            Command::Vrfy {
                arg: Some("Alice <alice@example.com>".into())
            }
        );
        assert_eq!(Command::parse("VRFY"), Command::Vrfy { arg: None });
    }

    #[test]
    fn test_parse_not_implemented() {
        for verb in ["EXPN", "help", "Turn", "SEND", "SOML", "SAML"] {
            assert!(matches!(
                Command::parse(verb),
                Command::NotImplemented { .. }
            ));
        }
        assert_eq!(Command::parse("expn staff").verb(), "EXPN");
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            Command::parse("STARTTLS"),
            Command::Unknown {
                verb: "STARTTLS".into()
            }
        );
        assert_eq!(Command::parse("").verb(), "");
    }
}
