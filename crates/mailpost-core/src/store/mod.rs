//! On-disk mailbox storage.
//!
//! Every mailbox is a directory under a common base directory, holding one
//! file per message named `<n>.mail`. There is no index file: a session
//! enumerates the directory when it starts and works on that snapshot.
//!
//! Delivery hard-links a spooled message into each recipient's directory.
//! Link creation is atomic and never replaces an existing file, so
//! concurrent deliveries to the same mailbox simply probe for the next
//! free number.

mod message;
mod recipients;

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::{Error, Result};

pub use message::{LookupError, Message, MessageList};
pub use recipients::RecipientSet;

/// Suffix shared by every message file.
pub const MAIL_FILE_SUFFIX: &str = ".mail";

/// Prefix for spooled message bodies waiting for delivery.
const SPOOL_PREFIX: &str = "tmp";

/// A message body written to a temporary file, ready for delivery.
///
/// The file is removed when this value is dropped; delivered copies are
/// separate hard links and survive it.
#[derive(Debug)]
pub struct SpooledMessage {
    path: TempPath,
    size: u64,
}

impl SpooledMessage {
    /// Returns the temporary file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the body size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }
}

/// Filesystem-backed mailbox store.
#[derive(Debug, Clone)]
pub struct MailStore {
    base_dir: PathBuf,
}

impl MailStore {
    /// Creates a store rooted at `base_dir`. Nothing is created on disk yet.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Creates the base directory if it does not exist yet.
    ///
    /// Failing here is not fatal: later deliveries will fail per recipient.
    pub async fn ensure_base(&self) -> bool {
        match fs::create_dir_all(&self.base_dir).await {
            Ok(()) => true,
            Err(e) => {
                warn!(dir = %self.base_dir.display(), error = %e, "Cannot create mail directory");
                false
            }
        }
    }

    /// Maps a user name to its mailbox directory.
    ///
    /// User names are case-insensitive, so the directory name is lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMailbox`] for names that are empty or could
    /// escape the base directory.
    pub fn mailbox_dir(&self, user: &str) -> Result<PathBuf> {
        let name = user.to_ascii_lowercase();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(Error::InvalidMailbox(user.to_string()));
        }
        Ok(self.base_dir.join(name))
    }

    /// Takes a snapshot of a user's mailbox.
    ///
    /// Only regular files ending in [`MAIL_FILE_SUFFIX`] count as messages.
    /// A missing or unreadable mailbox yields an empty list. Messages are
    /// ordered by their number so that earlier deliveries come first.
    pub async fn list_mailbox_messages(&self, user: &str) -> MessageList {
        let dir = match self.mailbox_dir(user) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(user, error = %e, "Refusing to list mailbox");
                return MessageList::default();
            }
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(user, "Mailbox does not exist yet");
                return MessageList::default();
            }
            Err(e) => {
                warn!(user, error = %e, "Cannot read mailbox");
                return MessageList::default();
            }
        };

        let mut messages = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(user, error = %e, "Mailbox listing interrupted");
                    break;
                }
            };

            if !is_mail_file_name(&entry.file_name()) {
                continue;
            }
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {}
                _ => continue,
            }
            match entry.metadata().await {
                Ok(metadata) => messages.push(Message::new(entry.path(), metadata.len())),
                Err(e) => debug!(path = %entry.path().display(), error = %e, "Skipping message"),
            }
        }

        messages.sort_by_cached_key(|m| (message_number(m.path()), m.path().to_path_buf()));
        debug!(user, count = messages.len(), "Loaded mailbox");
        MessageList::new(messages)
    }

    /// Writes a message body to a fresh temporary file in the base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub async fn spool<I, B>(&self, chunks: I) -> Result<SpooledMessage>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        fs::create_dir_all(&self.base_dir).await?;
        let base_dir = self.base_dir.clone();
        let temp = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(SPOOL_PREFIX)
                .tempfile_in(base_dir)
        })
        .await
        .map_err(io::Error::other)??;
        let (file, path) = temp.into_parts();

        let mut file = fs::File::from_std(file);
        let mut size = 0u64;
        for chunk in chunks {
            let chunk = chunk.as_ref();
            file.write_all(chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(SpooledMessage { path, size })
    }

    /// Links `source` into the mailbox of every recipient.
    ///
    /// Each recipient gets an independent file, so a name listed twice
    /// receives two copies. The source file is left untouched. Failures are
    /// logged per recipient and do not stop the others; the paths of the
    /// files that were created are returned.
    pub async fn deliver(&self, source: &Path, recipients: &RecipientSet) -> Vec<PathBuf> {
        let mut delivered = Vec::with_capacity(recipients.len());
        if recipients.is_empty() {
            return delivered;
        }

        self.ensure_base().await;
        for user in recipients.iter() {
            match self.deliver_one(source, user).await {
                Ok(path) => {
                    info!(user, path = %path.display(), "Delivered message");
                    delivered.push(path);
                }
                Err(e) => warn!(user, error = %e, "Delivery failed"),
            }
        }
        delivered
    }

    async fn deliver_one(&self, source: &Path, user: &str) -> Result<PathBuf> {
        let dir = self.mailbox_dir(user)?;
        fs::create_dir_all(&dir).await?;

        let mut number: u64 = 0;
        loop {
            let target = dir.join(format!("{number}{MAIL_FILE_SUFFIX}"));
            match fs::hard_link(source, &target).await {
                Ok(()) => return Ok(target),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => number += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_mail_file_name(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|n| n.len() > MAIL_FILE_SUFFIX.len() && n.ends_with(MAIL_FILE_SUFFIX))
}

fn message_number(path: &Path) -> u64 {
    path.file_stem()
        .and_then(OsStr::to_str)
        .and_then(|stem| stem.parse().ok())
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mail_file_name() {
        assert!(is_mail_file_name(OsStr::new("0.mail")));
        assert!(is_mail_file_name(OsStr::new("draft.mail")));
        assert!(!is_mail_file_name(OsStr::new(".mail")));
        assert!(!is_mail_file_name(OsStr::new("0.mail.bak")));
        assert!(!is_mail_file_name(OsStr::new("notes.txt")));
    }

    #[test]
    fn test_mailbox_dir_is_lowercased() {
        let store = MailStore::new("mail.store");
        assert_eq!(
            store.mailbox_dir("Alice").unwrap(),
            Path::new("mail.store").join("alice")
        );
    }

    #[test]
    fn test_mailbox_dir_rejects_escapes() {
        let store = MailStore::new("mail.store");
        for name in ["", ".", "..", "../etc", "a/b", "a\\b", "nul\0"] {
            assert!(
                matches!(store.mailbox_dir(name), Err(Error::InvalidMailbox(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_message_number_ordering() {
        assert_eq!(message_number(Path::new("x/10.mail")), 10);
        assert_eq!(message_number(Path::new("x/draft.mail")), u64::MAX);
    }
}
