//! Message snapshot types.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::Result;

/// Why a position in a [`MessageList`] could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The position is past the end of the snapshot.
    #[error("no such message")]
    NoSuchMessage,
    /// The message exists but is flagged for deletion.
    #[error("message already deleted")]
    Deleted,
}

/// A stored message as seen by one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    path: PathBuf,
    size: u64,
    deleted: bool,
    unique_id: Option<String>,
}

/// Digest bytes carried in a unique id, written as hex.
const UNIQUE_ID_DIGEST_BYTES: usize = 12;

impl Message {
    /// Creates a message entry for a file of the given size.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            deleted: false,
            unique_id: None,
        }
    }

    /// Returns the storage path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the size in bytes, as recorded when the snapshot was taken.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the file name without its suffix (`"3"` for `3.mail`).
    #[must_use]
    pub fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }

    /// Returns an identifier for this message that is not handed to a
    /// different message later.
    ///
    /// File names are reused once a deleted message is gone, so the id is
    /// the name followed by a digest of the content and modification time
    /// (`"3.5f0c..."`). It is computed on first use and kept for the rest
    /// of the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the content can no longer be read.
    pub async fn unique_id(&mut self) -> Result<&str> {
        let id = match self.unique_id.take() {
            Some(id) => id,
            None => {
                let digest = content_digest(&self.path).await?;
                format!("{}.{digest}", self.name())
            }
        };
        Ok(self.unique_id.insert(id))
    }

    /// Returns true if the message is flagged for deletion.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Flags the message for deletion. Calling this again has no effect.
    pub const fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Opens the message content for reading from the start.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can no longer be opened.
    pub async fn open(&self) -> Result<fs::File> {
        Ok(fs::File::open(&self.path).await?)
    }
}

async fn content_digest(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 8192];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let modified = file.metadata().await?.modified()?;
    if let Ok(since_epoch) = modified.duration_since(UNIX_EPOCH) {
        hasher.update(since_epoch.as_nanos().to_be_bytes());
    }

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(UNIQUE_ID_DIGEST_BYTES * 2);
    for byte in digest.iter().take(UNIQUE_ID_DIGEST_BYTES) {
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

/// Position-stable view over a mailbox, taken once per session.
///
/// Positions are 0-based and never shift: flagging message 1 as deleted
/// leaves message 2 at position 2. Flagged messages stay on disk until the
/// list is [released](Self::release).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageList {
    messages: Vec<Message>,
}

impl MessageList {
    /// Creates a snapshot from already enumerated messages.
    #[must_use]
    pub const fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Number of positions in the snapshot, deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the snapshot has no positions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages not flagged for deletion.
    #[must_use]
    pub fn count(&self) -> usize {
        self.messages.iter().filter(|m| !m.deleted).count()
    }

    /// Total size in bytes of the messages not flagged for deletion.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.messages
            .iter()
            .filter(|m| !m.deleted)
            .map(|m| m.size)
            .sum()
    }

    /// Returns the message at `index`, or `None` if the position is out of
    /// range or the message is flagged for deletion.
    #[must_use]
    pub fn message_at(&self, index: usize) -> Option<&Message> {
        self.lookup(index).ok()
    }

    /// Like [`message_at`](Self::message_at), but tells the two failure
    /// cases apart.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NoSuchMessage`] past the end of the snapshot
    /// and [`LookupError::Deleted`] for a flagged message.
    pub fn lookup(&self, index: usize) -> std::result::Result<&Message, LookupError> {
        match self.messages.get(index) {
            None => Err(LookupError::NoSuchMessage),
            Some(message) if message.deleted => Err(LookupError::Deleted),
            Some(message) => Ok(message),
        }
    }

    /// Returns the message at `index` whether or not it is flagged.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// Mutable counterpart of [`get`](Self::get).
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Message> {
        self.messages.get_mut(index)
    }

    /// Flags the message at `index` for deletion.
    ///
    /// # Errors
    ///
    /// Fails the same way as [`lookup`](Self::lookup); a message that is
    /// already flagged is reported as [`LookupError::Deleted`].
    pub fn mark_deleted(&mut self, index: usize) -> std::result::Result<&Message, LookupError> {
        match self.messages.get_mut(index) {
            None => Err(LookupError::NoSuchMessage),
            Some(message) if message.deleted => Err(LookupError::Deleted),
            Some(message) => {
                message.mark_deleted();
                Ok(message)
            }
        }
    }

    /// Clears every deletion flag and returns how many were set.
    pub fn restore_all(&mut self) -> usize {
        let mut restored = 0;
        for message in &mut self.messages {
            if message.deleted {
                message.deleted = false;
                restored += 1;
            }
        }
        restored
    }

    /// Iterates over every position, deleted ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Iterates over `(index, message)` for messages not flagged.
    pub fn iter_visible(&self) -> impl Iterator<Item = (usize, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.deleted)
    }

    /// Ends the session's view: removes every flagged message from disk.
    ///
    /// Removal is best-effort; failures are logged and skipped. Returns the
    /// number of files actually removed.
    pub async fn release(self) -> usize {
        let mut removed = 0;
        for message in self.messages.into_iter().filter(|m| m.deleted) {
            match fs::remove_file(&message.path).await {
                Ok(()) => {
                    debug!(path = %message.path.display(), "Removed deleted message");
                    removed += 1;
                }
                Err(e) => {
                    warn!(path = %message.path.display(), error = %e, "Failed to remove deleted message");
                }
            }
        }
        removed
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn sample() -> MessageList {
        MessageList::new(vec![
            Message::new("mail.store/alice/0.mail", 120),
            Message::new("mail.store/alice/1.mail", 45),
            Message::new("mail.store/alice/2.mail", 300),
        ])
    }

    #[test]
    fn test_count_and_total_size() {
        let list = sample();
        assert_eq!(list.len(), 3);
        assert_eq!(list.count(), 3);
        assert_eq!(list.total_size(), 465);
    }

    #[test]
    fn test_empty_list() {
        let list = MessageList::default();
        assert!(list.is_empty());
        assert_eq!(list.count(), 0);
        assert_eq!(list.total_size(), 0);
        assert!(list.message_at(0).is_none());
    }

    #[test]
    fn test_deleted_message_is_hidden_but_positions_stay() {
        let mut list = sample();
        list.mark_deleted(1).unwrap();

        assert_eq!(list.count(), 2);
        assert_eq!(list.total_size(), 420);
        assert!(list.message_at(1).is_none());
        assert_eq!(list.lookup(1), Err(LookupError::Deleted));
        assert_eq!(list.message_at(2).unwrap().size(), 300);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_lookup_out_of_range() {
        let list = sample();
        assert_eq!(list.lookup(3), Err(LookupError::NoSuchMessage));
    }

    #[test]
    fn test_mark_deleted_twice() {
        let mut list = sample();
        list.get_mut(0).unwrap().mark_deleted();
        list.get_mut(0).unwrap().mark_deleted();

        assert_eq!(list.count(), 2);
        assert!(list.message_at(0).is_none());
        assert_eq!(list.mark_deleted(0), Err(LookupError::Deleted));
        assert_eq!(list.restore_all(), 1);
    }

    #[test]
    fn test_restore_all_round_trip() {
        let mut list = sample();
        list.mark_deleted(0).unwrap();
        list.mark_deleted(2).unwrap();
        assert_eq!(list.count(), 1);

        assert_eq!(list.restore_all(), 2);
        assert_eq!(list.count(), 3);
        assert_eq!(list.message_at(0).unwrap().size(), 120);
        assert_eq!(list.message_at(2).unwrap().size(), 300);
        assert_eq!(list.restore_all(), 0);
    }

    #[test]
    fn test_iter_visible_skips_deleted() {
        let mut list = sample();
        list.mark_deleted(0).unwrap();
        let visible: Vec<usize> = list.iter_visible().map(|(i, _)| i).collect();
        assert_eq!(visible, vec![1, 2]);
    }

    #[test]
    fn test_name_is_file_stem() {
        let message = Message::new("mail.store/bob/17.mail", 1);
        assert_eq!(message.name(), "17");
    }

    #[tokio::test]
    async fn test_unique_id_follows_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.mail");
        std::fs::write(&path, "first message\r\n").unwrap();

        let mut first = Message::new(&path, 15);
        let first_id = first.unique_id().await.unwrap().to_string();
        assert!(first_id.starts_with("0."));
        assert_eq!(first_id.len(), 2 + UNIQUE_ID_DIGEST_BYTES * 2);
        assert!(first_id.bytes().all(|b| b.is_ascii_graphic()));

        // Same file, same content: same id in a later snapshot.
        let mut again = Message::new(&path, 15);
        assert_eq!(again.unique_id().await.unwrap(), first_id);

        // The name is reused for a different message.
        std::fs::write(&path, "second message\r\n").unwrap();
        let mut reused = Message::new(&path, 16);
        assert_ne!(reused.unique_id().await.unwrap(), first_id);
    }

    #[tokio::test]
    async fn test_unique_id_is_cached_for_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("4.mail");
        std::fs::write(&path, "hello\r\n").unwrap();

        let mut message = Message::new(&path, 7);
        let id = message.unique_id().await.unwrap().to_string();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(message.unique_id().await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_unique_id_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut message = Message::new(dir.path().join("9.mail"), 0);
        assert!(message.unique_id().await.is_err());
    }
}
