//! # mailpost-smtp
//!
//! An SMTP submission server engine implementing the RFC 5321 minimal
//! command set, delivering accepted messages into the `mailpost-core`
//! mailbox store.
//!
//! ## Features
//!
//! - **Envelope state machine**: `HELO` → `MAIL` → `RCPT`+ → `DATA`, with
//!   any number of messages per connection
//! - **Local delivery**: recipients are validated against the user
//!   directory and each receives its own hard link of the spooled body
//! - **Transparency**: dot-unstuffing of body lines per RFC 5321 §4.5.2
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailpost_core::{MailStore, UserTable};
//! use mailpost_smtp::{Session, SessionConfig};
//!
//! let users = Arc::new(UserTable::load("users.txt").await?);
//! let store = MailStore::new("mail.store");
//! let config = SessionConfig::new("mx.example.com");
//! let (socket, _) = listener.accept().await?;
//! Session::new(socket, users, store, config).run().await?;
//! ```
//!
//! ## Modules
//!
//! - [`command`]: Command line parser
//! - [`parser`]: Reverse-path and forward-path parsing
//! - [`session`]: Per-connection state machine
//! - [`state`]: Session states and the mail envelope
//! - [`types`]: Addresses and replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod error;
pub mod parser;
pub mod session;
pub mod state;
pub mod types;

pub use command::Command;
pub use error::ParseError;
pub use session::{Session, SessionConfig};
pub use state::{Envelope, SessionState};
pub use types::{Address, Reply, ReplyCode};

/// Default SMTP port.
pub const DEFAULT_PORT: u16 = 25;
