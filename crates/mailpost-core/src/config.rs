//! Server configuration shared by both protocol engines.

use std::path::PathBuf;

use crate::line::DEFAULT_LINE_CAPACITY;
use crate::{Error, Result};

/// Default mailbox base directory.
pub const DEFAULT_MAIL_DIR: &str = "mail.store";

/// Default credentials file.
pub const DEFAULT_USERS_FILE: &str = "users.txt";

/// How a retrieval session answers for a message it has flagged deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletedLookup {
    /// Same answer as for a message that never existed.
    #[default]
    NotFound,
    /// A distinct "already deleted" answer.
    Report,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name announced in greetings.
    pub hostname: String,
    /// Base directory of the mailbox store.
    pub mail_dir: PathBuf,
    /// Credentials file.
    pub users_file: PathBuf,
    /// Longest command line accepted; also the line reader capacity.
    pub max_line_length: usize,
    /// Answer for lookups of deleted messages.
    pub deleted_lookup: DeletedLookup,
}

impl ServerConfig {
    /// Creates a configuration with defaults for everything but the host name.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            mail_dir: PathBuf::from(DEFAULT_MAIL_DIR),
            users_file: PathBuf::from(DEFAULT_USERS_FILE),
            max_line_length: DEFAULT_LINE_CAPACITY,
            deleted_lookup: DeletedLookup::NotFound,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(hostname: impl Into<String>) -> ServerConfigBuilder {
        ServerConfigBuilder::new(hostname)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

/// Builder for server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    hostname: String,
    mail_dir: Option<PathBuf>,
    users_file: Option<PathBuf>,
    max_line_length: usize,
    deleted_lookup: DeletedLookup,
}

impl ServerConfigBuilder {
    /// Creates a new builder with the given host name.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            mail_dir: None,
            users_file: None,
            max_line_length: DEFAULT_LINE_CAPACITY,
            deleted_lookup: DeletedLookup::NotFound,
        }
    }

    /// Sets the mailbox base directory.
    #[must_use]
    pub fn mail_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mail_dir = Some(dir.into());
        self
    }

    /// Sets the credentials file.
    #[must_use]
    pub fn users_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.users_file = Some(path.into());
        self
    }

    /// Sets the maximum line length.
    #[must_use]
    pub const fn max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    /// Sets the answer for lookups of deleted messages.
    #[must_use]
    pub const fn deleted_lookup(mut self, policy: DeletedLookup) -> Self {
        self.deleted_lookup = policy;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty host name or a zero
    /// line length.
    pub fn build(self) -> Result<ServerConfig> {
        let hostname = self.hostname.trim().to_string();
        if hostname.is_empty() {
            return Err(Error::InvalidConfig("hostname cannot be empty".into()));
        }
        if self.max_line_length == 0 {
            return Err(Error::InvalidConfig(
                "max line length must be at least 1".into(),
            ));
        }

        Ok(ServerConfig {
            hostname,
            mail_dir: self
                .mail_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MAIL_DIR)),
            users_file: self
                .users_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_USERS_FILE)),
            max_line_length: self.max_line_length,
            deleted_lookup: self.deleted_lookup,
        })
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

    #[test]
    fn test_config_new() {
        let config = ServerConfig::new("mx.example.com");
        assert_eq!(config.hostname, "mx.example.com");
        assert_eq!(config.mail_dir, PathBuf::from("mail.store"));
        assert_eq!(config.users_file, PathBuf::from("users.txt"));
        assert_eq!(config.max_line_length, 1024);
        assert_eq!(config.deleted_lookup, DeletedLookup::NotFound);
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::builder("mx.example.com")
            .mail_dir("/var/mail/store")
            .users_file("/etc/mailpost/users")
            .max_line_length(512)
            .deleted_lookup(DeletedLookup::Report)
            .build()
            .unwrap();

        assert_eq!(config.mail_dir, PathBuf::from("/var/mail/store"));
        assert_eq!(config.users_file, PathBuf::from("/etc/mailpost/users"));
        assert_eq!(config.max_line_length, 512);
        assert_eq!(config.deleted_lookup, DeletedLookup::Report);
    }

    #[test]
    fn test_config_builder_rejects_empty_hostname() {
        let result = ServerConfig::builder("   ").build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_config_builder_rejects_zero_line_length() {
        let result = ServerConfig::builder("localhost").max_line_length(0).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
