//! SMTP session engine.
//!
//! One [`Session`] serves one connection. Accepted messages are spooled to
//! a temporary file and hard-linked into every recipient's mailbox before
//! the final `250` is sent.

use std::sync::Arc;

use bytes::Bytes;
use mailpost_core::{
    DEFAULT_LINE_CAPACITY, LineReader, MailStore, Result, ServerConfig, UserDirectory,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::parser::{parse_forward_path, parse_reverse_path, parse_vrfy_address};
use crate::state::{Envelope, SessionState};
use crate::types::{Address, Reply, ReplyCode};

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Host name announced in the greeting and in HELO/QUIT replies.
    pub hostname: String,
    /// Longest command line accepted.
    pub max_line_length: usize,
}

impl SessionConfig {
    /// Creates a configuration for the given host name.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            max_line_length: DEFAULT_LINE_CAPACITY,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl From<&ServerConfig> for SessionConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            hostname: config.hostname.clone(),
            max_line_length: config.max_line_length,
        }
    }
}

/// Whether the command loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// A message body read after DATA.
struct Body {
    lines: Vec<Bytes>,
    /// The stream ended before the terminating `.`.
    eof: bool,
}

/// An SMTP session over a connected stream.
pub struct Session<S> {
    reader: LineReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,
    users: Arc<dyn UserDirectory>,
    store: MailStore,
    config: SessionConfig,
    state: SessionState,
    envelope: Envelope,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send,
{
    /// Creates a session. Nothing is sent until [`run`](Self::run).
    pub fn new(
        stream: S,
        users: Arc<dyn UserDirectory>,
        store: MailStore,
        config: SessionConfig,
    ) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: LineReader::with_capacity(read, config.max_line_length),
            writer: BufWriter::new(write),
            users,
            store,
            config,
            state: SessionState::Initial,
            envelope: Envelope::new(),
        }
    }

    /// Returns the current state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session until QUIT, end of stream or an I/O error.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from or writing to the client fails.
    pub async fn run(mut self) -> Result<()> {
        debug!("SMTP session started");
        let result = self.serve().await;
        self.state = SessionState::Terminated;
        let _ = self.writer.flush().await;
        debug!("SMTP session ended");
        result
    }

    async fn serve(&mut self) -> Result<()> {
        let greeting = format!("{} Simple Mail Transfer Service Ready", self.config.hostname);
        self.send(&Reply::single(ReplyCode::SERVICE_READY, greeting))
            .await?;

        loop {
            let Some(line) = self.reader.read_line().await? else {
                debug!("Client closed connection");
                return Ok(());
            };

            if line.is_truncated() && line.len() >= self.reader.capacity() {
                warn!(limit = self.reader.capacity(), "Command line too long");
                self.reader.discard_line().await?;
                self.send(&Reply::single(ReplyCode::SYNTAX_ERROR, "Line too long"))
                    .await?;
                continue;
            }

            let command = Command::parse(&line.text());
            debug!(command = command.verb(), state = ?self.state, "Received command");
            if self.handle(command).await? == Flow::Quit {
                return Ok(());
            }
        }
    }

    async fn handle(&mut self, command: Command) -> Result<Flow> {
        let reply = match command {
            Command::Helo { .. } | Command::Ehlo { .. } => self.helo(),
            Command::Mail { args } => self.mail(&args),
            Command::Rcpt { args } => self.rcpt(&args),
            Command::Data => return self.data().await,
            Command::Rset => self.rset(),
            Command::Vrfy { arg } => self.vrfy(arg.as_deref()),
            Command::Noop => Reply::single(ReplyCode::OK, "OK"),
            Command::Quit => {
                let text = format!("{} Service closing transmission channel", self.config.hostname);
                self.send(&Reply::single(ReplyCode::CLOSING, text)).await?;
                return Ok(Flow::Quit);
            }
            Command::NotImplemented { verb } => {
                debug!(verb, "Command not implemented");
                Reply::single(ReplyCode::NOT_IMPLEMENTED, "Command not implemented")
            }
            Command::Unknown { verb } => {
                debug!(verb, "Unknown command");
                Reply::single(ReplyCode::SYNTAX_ERROR, "Syntax error, command unrecognized")
            }
        };

        self.send(&reply).await?;
        Ok(Flow::Continue)
    }

    fn helo(&mut self) -> Reply {
        self.envelope.clear();
        self.state = SessionState::Greeted;
        Reply::single(ReplyCode::OK, self.config.hostname.clone())
    }

    fn mail(&mut self, args: &str) -> Reply {
        if !self.state.can_mail() {
            return bad_sequence();
        }
        match parse_reverse_path(args) {
            Ok(sender) => {
                debug!(sender = %sender, "Sender accepted");
                self.envelope.sender = Some(sender);
                self.state = SessionState::HasSender;
                Reply::single(ReplyCode::OK, "OK")
            }
            Err(e) => syntax_error(&e),
        }
    }

    fn rcpt(&mut self, args: &str) -> Reply {
        if !self.state.can_rcpt() {
            return bad_sequence();
        }
        let recipient = match parse_forward_path(args) {
            Ok(recipient) => recipient,
            Err(e) => return syntax_error(&e),
        };

        let user = recipient.local_part();
        if !self.users.exists(user) {
            debug!(recipient = %recipient, "Recipient is not a local user");
            return Reply::single(ReplyCode::USER_NOT_LOCAL, "User not local");
        }

        debug!(recipient = %recipient, "Recipient accepted");
        self.envelope.recipients.push(user);
        self.state = SessionState::HasRecipients;
        Reply::single(ReplyCode::OK, "OK")
    }

    fn rset(&mut self) -> Reply {
        if !self.state.is_greeted() {
            return bad_sequence();
        }
        self.envelope.clear();
        self.state = SessionState::Greeted;
        Reply::single(ReplyCode::OK, "OK")
    }

    fn vrfy(&self, arg: Option<&str>) -> Reply {
        let Some(arg) = arg else {
            return Reply::single(ReplyCode::PARAMETER_ERROR, "Argument required");
        };
        match parse_vrfy_address(arg) {
            Some(addr) if self.users.exists(addr.local_part()) => {
                Reply::single(ReplyCode::OK, format!("<{addr}>"))
            }
            _ => Reply::single(ReplyCode::USER_AMBIGUOUS, "User ambiguous"),
        }
    }

    async fn data(&mut self) -> Result<Flow> {
        if !self.state.can_data() {
            self.send(&bad_sequence()).await?;
            return Ok(Flow::Continue);
        }

        self.send(&Reply::single(
            ReplyCode::START_DATA,
            "Start mail input; end with <CRLF>.<CRLF>",
        ))
        .await?;

        let body = self.read_body().await?;
        let reply = self.deliver(&body.lines).await;
        self.envelope.clear();
        self.state = SessionState::Greeted;
        self.send(&reply).await?;

        if body.eof {
            debug!("Stream ended during DATA");
            return Ok(Flow::Quit);
        }
        Ok(Flow::Continue)
    }

    /// Reads body lines up to the lone `.`, removing one leading dot from
    /// every other line. Lines longer than the reader capacity arrive in
    /// pieces; only the first piece of a line is unstuffed.
    async fn read_body(&mut self) -> Result<Body> {
        let mut lines = Vec::new();
        let mut at_line_start = true;

        while let Some(line) = self.reader.read_line().await? {
            let complete = line.is_complete();
            if at_line_start && complete && line.content() == b"." {
                return Ok(Body { lines, eof: false });
            }

            let bytes = line.into_bytes();
            if at_line_start && bytes.first() == Some(&b'.') {
                lines.push(bytes.slice(1..));
            } else {
                lines.push(bytes);
            }
            at_line_start = complete;
        }

        Ok(Body { lines, eof: true })
    }

    async fn deliver(&self, lines: &[Bytes]) -> Reply {
        let spooled = match self.store.spool(lines).await {
            Ok(spooled) => spooled,
            Err(e) => {
                warn!(error = %e, "Cannot spool message");
                return local_error();
            }
        };

        let delivered = self
            .store
            .deliver(spooled.path(), &self.envelope.recipients)
            .await;
        if delivered.is_empty() {
            return local_error();
        }

        info!(
            sender = self.envelope.sender.as_ref().map_or("", Address::as_str),
            recipients = delivered.len(),
            size = spooled.size(),
            "Message accepted"
        );
        Reply::single(ReplyCode::OK, "OK")
    }

    async fn send(&mut self, reply: &Reply) -> Result<()> {
        self.writer.write_all(&reply.to_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

fn bad_sequence() -> Reply {
    Reply::single(ReplyCode::BAD_SEQUENCE, "Bad sequence of commands")
}

fn syntax_error(error: &crate::ParseError) -> Reply {
    debug!(error = %error, "Bad path");
    Reply::single(
        ReplyCode::PARAMETER_ERROR,
        "Syntax error in parameters or arguments",
    )
}

fn local_error() -> Reply {
    Reply::single(
        ReplyCode::LOCAL_ERROR,
        "Requested action aborted: local error in processing",
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_from_server_config() {
        let server = ServerConfig::builder("mx.example.com")
            .max_line_length(2048)
            .build()
            .unwrap();
        let config = SessionConfig::from(&server);
        assert_eq!(config.hostname, "mx.example.com");
        assert_eq!(config.max_line_length, 2048);
    }

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.max_line_length, DEFAULT_LINE_CAPACITY);
    }
}
