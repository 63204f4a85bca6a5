//! POP3 session engine.
//!
//! One [`Session`] serves one connection from greeting to teardown. It
//! reads command lines with a [`LineReader`], answers them according to
//! the current [`SessionState`] and, however the session ends, removes
//! the messages flagged with DELE before returning.

use std::sync::Arc;

use mailpost_core::{
    DEFAULT_LINE_CAPACITY, DeletedLookup, LineReader, LookupError, MailStore, Message,
    MessageList, Result, ServerConfig, UserDirectory,
};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf,
    WriteHalf,
};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::error::ParseError;
use crate::response::{self, Response, TERMINATOR};
use crate::state::SessionState;
use crate::types::MessageNumber;

const GREETING: &str = "POP3 server ready";
const BAD_SEQUENCE: &str = "command not valid in this state";
const NO_SUCH_MESSAGE: &str = "no such message";

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Longest command line accepted.
    pub max_line_length: usize,
    /// Answer for lookups of messages flagged deleted.
    pub deleted_lookup: DeletedLookup,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_LINE_CAPACITY,
            deleted_lookup: DeletedLookup::NotFound,
        }
    }
}

impl From<&ServerConfig> for SessionConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_line_length: config.max_line_length,
            deleted_lookup: config.deleted_lookup,
        }
    }
}

/// Whether the command loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// A POP3 session over a connected stream.
pub struct Session<S> {
    reader: LineReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,
    users: Arc<dyn UserDirectory>,
    store: MailStore,
    config: SessionConfig,
    state: SessionState,
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
            state: SessionState::Unauthenticated,
        }
    }

    /// Returns the current state.
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Runs the session until QUIT, end of stream or an I/O error.
    ///
    /// Messages flagged for deletion are removed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from or writing to the client fails.
    pub async fn run(mut self) -> Result<()> {
        debug!("POP3 session started");
        let result = self.serve().await;
        self.teardown().await;
        result
    }

    async fn serve(&mut self) -> Result<()> {
        self.send(&Response::ok(GREETING)).await?;

        loop {
            let Some(line) = self.reader.read_line().await? else {
                debug!("Client closed connection");
                return Ok(());
            };

            if line.is_truncated() && line.len() >= self.reader.capacity() {
                warn!(limit = self.reader.capacity(), "Command line too long");
                self.reader.discard_line().await?;
                self.send(&Response::err("line too long")).await?;
                continue;
            }

            let command = Command::parse(&line.text());
            debug!(command = command.name(), "Received command");
            if self.handle(command).await? == Flow::Quit {
                return Ok(());
            }
        }
    }

    async fn handle(&mut self, command: Command) -> Result<Flow> {
        let response = match command {
            Command::User { username } => self.user(username),
            Command::Pass { password } => self.pass(password.as_deref()).await,
            Command::Stat => self.stat(),
            Command::List { msg } => return self.list(msg.as_deref()).await,
            Command::Uidl { msg } => return self.uidl(msg.as_deref()).await,
            Command::Retr { msg } => return self.retr(msg.as_deref()).await,
            Command::Dele { msg } => self.dele(msg.as_deref()),
            Command::Noop => Response::ok(""),
            Command::Rset => self.transaction(|mailbox| {
                Response::ok(format!("{} messages restored", mailbox.restore_all()))
            }),
            Command::Quit => {
                self.send(&Response::ok("goodbye")).await?;
                return Ok(Flow::Quit);
            }
            Command::Unknown { keyword } => {
                debug!(keyword, "Unknown command");
                Response::err("unrecognized command")
            }
        };

        self.send(&response).await?;
        Ok(Flow::Continue)
    }

    fn user(&mut self, username: Option<String>) -> Response {
        if self.state != SessionState::Unauthenticated {
            return Response::err(BAD_SEQUENCE);
        }
        let Some(username) = username else {
            return Response::err("missing user name");
        };
        if !self.users.exists(&username) {
            debug!(user = %username, "Unknown user");
            return Response::err("no such user");
        }

        let response = Response::ok(format!("{username} accepted"));
        self.state = SessionState::UserKnown { username };
        response
    }

    async fn pass(&mut self, password: Option<&str>) -> Response {
        let SessionState::UserKnown { username } = &self.state else {
            return Response::err(BAD_SEQUENCE);
        };
        let Some(password) = password else {
            return Response::err("missing password");
        };
        if !self.users.authenticate(username, password) {
            warn!(user = %username, "Authentication failed");
            return Response::err("invalid password");
        }

        let username = username.clone();
        let mailbox = self.store.list_mailbox_messages(&username).await;
        info!(user = %username, messages = mailbox.count(), "User logged in");
        let response = Response::ok(format!(
            "maildrop has {} messages ({} octets)",
            mailbox.count(),
            mailbox.total_size()
        ));
        self.state = SessionState::Active { username, mailbox };
        response
    }

    fn stat(&self) -> Response {
        self.state.mailbox().map_or_else(
            || Response::err(BAD_SEQUENCE),
            |mailbox| Response::ok(format!("{} {}", mailbox.count(), mailbox.total_size())),
        )
    }

    fn dele(&mut self, msg: Option<&str>) -> Response {
        let deleted_lookup = self.config.deleted_lookup;
        let Some(mailbox) = self.state.mailbox_mut() else {
            return Response::err(BAD_SEQUENCE);
        };
        let number = match resolve(mailbox, msg, deleted_lookup) {
            Ok((number, _)) => number,
            Err(response) => return response,
        };
        match mailbox.mark_deleted(number.index()) {
            Ok(_) => Response::ok(format!("message {number} deleted")),
            Err(e) => lookup_failure(number, e, deleted_lookup),
        }
    }

    async fn list(&mut self, msg: Option<&str>) -> Result<Flow> {
        let Some(mailbox) = self.state.mailbox() else {
            self.send(&Response::err(BAD_SEQUENCE)).await?;
            return Ok(Flow::Continue);
        };

        let reply = if msg.is_some() {
            match resolve(mailbox, msg, self.config.deleted_lookup) {
                Ok((number, message)) => Response::ok(format!("{number} {}", message.size())).to_bytes(),
                Err(response) => response.to_bytes(),
            }
        } else {
            let mut out = listing_header(mailbox);
            for (index, message) in mailbox.iter_visible() {
                if let Some(number) = MessageNumber::from_index(index) {
                    out.extend_from_slice(format!("{number} {}\r\n", message.size()).as_bytes());
                }
            }
            out.extend_from_slice(TERMINATOR);
            out
        };

        self.send_raw(&reply).await?;
        Ok(Flow::Continue)
    }

    async fn uidl(&mut self, msg: Option<&str>) -> Result<Flow> {
        let deleted_lookup = self.config.deleted_lookup;
        let Some(mailbox) = self.state.mailbox_mut() else {
            self.send(&Response::err(BAD_SEQUENCE)).await?;
            return Ok(Flow::Continue);
        };

        let reply = if msg.is_some() {
            match resolve(mailbox, msg, deleted_lookup).map(|(number, _)| number) {
                Ok(number) => match unique_id(mailbox, number).await {
                    Some(id) => Response::ok(format!("{number} {id}")).to_bytes(),
                    None => Response::err("cannot read message").to_bytes(),
                },
                Err(response) => response.to_bytes(),
            }
        } else {
            let mut out = listing_header(mailbox);
            let numbers: Vec<MessageNumber> = mailbox
                .iter_visible()
                .filter_map(|(index, _)| MessageNumber::from_index(index))
                .collect();
            for number in numbers {
                if let Some(id) = unique_id(mailbox, number).await {
                    out.extend_from_slice(format!("{number} {id}\r\n").as_bytes());
                }
            }
            out.extend_from_slice(TERMINATOR);
            out
        };

        self.send_raw(&reply).await?;
        Ok(Flow::Continue)
    }

    async fn retr(&mut self, msg: Option<&str>) -> Result<Flow> {
        let Some(mailbox) = self.state.mailbox() else {
            self.send(&Response::err(BAD_SEQUENCE)).await?;
            return Ok(Flow::Continue);
        };
        let message = match resolve(mailbox, msg, self.config.deleted_lookup) {
            Ok((_, message)) => message.clone(),
            Err(response) => {
                self.send(&response).await?;
                return Ok(Flow::Continue);
            }
        };

        let file = match message.open().await {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %message.path().display(), error = %e, "Cannot open message");
                self.send(&Response::err("cannot open message")).await?;
                return Ok(Flow::Continue);
            }
        };

        self.writer
            .write_all(&Response::ok(format!("{} octets", message.size())).to_bytes())
            .await?;

        let mut file = BufReader::new(file);
        let mut line = Vec::new();
        let mut out = Vec::new();
        loop {
            line.clear();
            if file.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            out.clear();
            response::push_body_line(&mut out, &line);
            self.writer.write_all(&out).await?;
        }
        self.writer.write_all(TERMINATOR).await?;
        self.writer.flush().await?;

        debug!(path = %message.path().display(), size = message.size(), "Sent message");
        Ok(Flow::Continue)
    }

    /// Runs `f` on the mailbox, or rejects the command outside a transaction.
    fn transaction<F>(&mut self, f: F) -> Response
    where
        F: FnOnce(&mut MessageList) -> Response,
    {
        self.state
            .mailbox_mut()
            .map_or_else(|| Response::err(BAD_SEQUENCE), f)
    }

    async fn send(&mut self, response: &Response) -> Result<()> {
        self.send_raw(&response.to_bytes()).await
    }

    async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn teardown(&mut self) {
        if let Some((username, mailbox)) = self.state.terminate() {
            let removed = mailbox.release().await;
            info!(user = %username, removed, "Session ended");
        }
        let _ = self.writer.flush().await;
    }
}

/// Resolves a message number argument against the snapshot.
///
/// On failure the `-ERR` response to send is returned instead.
fn resolve<'a>(
    mailbox: &'a MessageList,
    arg: Option<&str>,
    deleted_lookup: DeletedLookup,
) -> std::result::Result<(MessageNumber, &'a Message), Response> {
    let Some(arg) = arg else {
        return Err(Response::err("missing message number"));
    };
    let number = match arg.parse::<MessageNumber>() {
        Ok(number) => number,
        Err(ParseError::ZeroMessageNumber) => return Err(Response::err(NO_SUCH_MESSAGE)),
        Err(e @ ParseError::InvalidMessageNumber(_)) => {
            debug!(error = %e, "Bad message number");
            return Err(Response::err("invalid message number"));
        }
    };
    mailbox
        .lookup(number.index())
        .map(|message| (number, message))
        .map_err(|e| lookup_failure(number, e, deleted_lookup))
}

fn listing_header(mailbox: &MessageList) -> Vec<u8> {
    Response::ok(format!(
        "{} messages ({} octets)",
        mailbox.count(),
        mailbox.total_size()
    ))
    .to_bytes()
}

/// Unique id of a resolved message; `None` if its content is unreadable.
async fn unique_id(mailbox: &mut MessageList, number: MessageNumber) -> Option<String> {
    let message = mailbox.get_mut(number.index())?;
    match message.unique_id().await.map(str::to_string) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(path = %message.path().display(), error = %e, "Cannot read message");
            None
        }
    }
}

fn lookup_failure(number: MessageNumber, error: LookupError, policy: DeletedLookup) -> Response {
    match (error, policy) {
        (LookupError::Deleted, DeletedLookup::Report) => {
            Response::err(format!("message {number} already deleted"))
        }
        _ => Response::err(NO_SUCH_MESSAGE),
    }
}
