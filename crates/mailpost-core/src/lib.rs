//! # mailpost-core
//!
//! Shared building blocks for the `mailpost` POP3 and SMTP servers.
//!
//! This crate provides:
//! - **Line framing** over any async byte stream, with a bounded cache
//! - **Mailbox storage** on the local filesystem, with hard-link fan-out
//!   delivery and session-scoped soft deletion
//! - **User lookup** against a plaintext credentials table
//! - **Server configuration** shared by both protocol engines
//!
//! ## Storage Layout
//!
//! ```text
//! mail.store/
//! ├── alice/
//! │   ├── 0.mail
//! │   └── 1.mail
//! └── bob/
//!     └── 0.mail
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod line;
pub mod store;
pub mod users;

pub use config::{DeletedLookup, ServerConfig, ServerConfigBuilder};
pub use error::{Error, Result};
pub use line::{DEFAULT_LINE_CAPACITY, Line, LineReader};
pub use store::{
    LookupError, MAIL_FILE_SUFFIX, MailStore, Message, MessageList, RecipientSet, SpooledMessage,
};
pub use users::{UserDirectory, UserTable};
