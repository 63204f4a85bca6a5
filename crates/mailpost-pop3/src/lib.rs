//! # mailpost-pop3
//!
//! A POP3 retrieval server engine implementing the RFC 1939 minimal
//! command set over the `mailpost-core` mailbox store.
//!
//! ## Features
//!
//! - **Session state machine**: `USER` → `PASS` → transaction commands, with
//!   out-of-sequence commands rejected without closing the connection
//! - **Commands**: USER, PASS, STAT, LIST, UIDL, RETR, DELE, NOOP, RSET, QUIT
//! - **Deferred deletion**: `DELE` only flags a message; files are removed
//!   when the session ends
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailpost_core::{MailStore, UserTable};
//! use mailpost_pop3::{Session, SessionConfig};
//!
//! let users = Arc::new(UserTable::load("users.txt").await?);
//! let store = MailStore::new("mail.store");
//! let (socket, _) = listener.accept().await?;
//! Session::new(socket, users, store, SessionConfig::default()).run().await?;
//! ```
//!
//! ## Session States
//!
//! ```text
//! ┌─────────────────┐
//! │ Unauthenticated │ ─── USER ───→ UserKnown ─── PASS ───→ Active
//! └─────────────────┘
//!         │                                                   │
//!         └──────────────────── QUIT ───→ Terminated ←────────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: Command line parser
//! - [`response`]: Status lines and multi-line framing
//! - [`session`]: Per-connection state machine
//! - [`state`]: Session states
//! - [`types`]: Message numbers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod error;
pub mod response;
pub mod session;
pub mod state;
pub mod types;

pub use command::Command;
pub use error::ParseError;
pub use response::Response;
pub use session::{Session, SessionConfig};
pub use state::SessionState;
pub use types::MessageNumber;

/// Default POP3 port.
pub const DEFAULT_PORT: u16 = 110;
