//! User lookup for authentication and recipient validation.
//!
//! The servers never own user accounts; they ask a [`UserDirectory`]
//! whether a name exists and whether a password matches. [`UserTable`] is
//! the plaintext-file implementation used in deployment: one
//! `username password` pair per line, whitespace separated.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::Result;

/// Answers existence and password queries about users.
///
/// User names are compared case-insensitively, passwords exactly.
pub trait UserDirectory: Send + Sync {
    /// Returns true if the user exists.
    fn exists(&self, username: &str) -> bool;

    /// Returns true if the user exists and `password` matches.
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// In-memory table of users and their plaintext passwords.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    users: HashMap<String, String>,
}

impl UserTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a table from a credentials file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;
        let table = Self::parse(&contents);
        info!(path = %path.display(), users = table.len(), "Loaded user table");
        Ok(table)
    }

    /// Parses credentials text.
    ///
    /// Tokens are read in pairs regardless of line breaks; a trailing
    /// unpaired token is ignored. When a user appears twice, the first
    /// entry wins.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let mut table = Self::new();
        let mut tokens = contents.split_whitespace();
        while let (Some(user), Some(password)) = (tokens.next(), tokens.next()) {
            table.insert(user, password);
        }
        table
    }

    /// Adds a user unless one with the same name is already present.
    ///
    /// Returns false if the name was taken.
    pub fn insert(&mut self, username: &str, password: impl Into<String>) -> bool {
        let key = username.to_ascii_lowercase();
        if self.users.contains_key(&key) {
            debug!(user = username, "Ignoring duplicate user entry");
            return false;
        }
        self.users.insert(key, password.into());
        true
    }

    /// Number of users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns true if the table has no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for UserTable {
    fn exists(&self, username: &str) -> bool {
        self.users.contains_key(&username.to_ascii_lowercase())
    }

    fn authenticate(&self, username: &str, password: &str) -> bool {
        self.users
            .get(&username.to_ascii_lowercase())
            .is_some_and(|stored| stored == password)
    }
}

impl<U, P> FromIterator<(U, P)> for UserTable
where
    U: AsRef<str>,
    P: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (U, P)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (user, password) in iter {
            table.insert(user.as_ref(), password);
        }
        table
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

    fn table() -> UserTable {
        UserTable::parse("alice Secret1\nBob hunter2\n  carol   pa$$  \n")
    }

    #[test]
    fn test_parse_counts_users() {
        assert_eq!(table().len(), 3);
        assert!(UserTable::parse("").is_empty());
    }

    #[test]
    fn test_exists_ignores_case() {
        let users = table();
        assert!(users.exists("alice"));
        assert!(users.exists("ALICE"));
        assert!(users.exists("bob"));
        assert!(!users.exists("dave"));
    }

    #[test]
    fn test_authenticate_password_is_case_sensitive() {
        let users = table();
        assert!(users.authenticate("Alice", "Secret1"));
        assert!(!users.authenticate("alice", "secret1"));
        assert!(users.authenticate("BOB", "hunter2"));
        assert!(!users.authenticate("dave", "hunter2"));
        assert!(users.authenticate("carol", "pa$$"));
    }

    #[test]
    fn test_first_entry_wins() {
        let users = UserTable::parse("alice first\nALICE second\n");
        assert_eq!(users.len(), 1);
        assert!(users.authenticate("alice", "first"));
        assert!(!users.authenticate("alice", "second"));
    }

    #[test]
    fn test_trailing_token_ignored() {
        let users = UserTable::parse("alice pw\nlonely");
        assert_eq!(users.len(), 1);
        assert!(!users.exists("lonely"));
    }

    #[test]
    fn test_from_iterator() {
        let users: UserTable = [("alice", "pw"), ("bob", "pw2")].into_iter().collect();
        assert!(users.exists("Bob"));
        assert!(users.authenticate("alice", "pw"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.txt");
        tokio::fs::write(&path, "alice pw\n").await.unwrap();

        let users = UserTable::load(&path).await.unwrap();
        assert!(users.authenticate("alice", "pw"));
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(UserTable::load(dir.path().join("absent.txt")).await.is_err());
    }
}
