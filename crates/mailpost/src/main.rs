//! `mailpost` - POP3 and SMTP servers over a shared local mailbox store.
//!
//! Each subcommand runs one protocol on one port. Both read the same
//! credentials file and mailbox directory, so mail submitted over SMTP is
//! retrievable over POP3.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mailpost_core::config::{DEFAULT_MAIL_DIR, DEFAULT_USERS_FILE};
use mailpost_core::{DEFAULT_LINE_CAPACITY, DeletedLookup, MailStore, ServerConfig, UserTable};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server::Protocol;

const DEFAULT_LOG_FILTER: &str =
    "mailpost=info,mailpost_core=info,mailpost_pop3=info,mailpost_smtp=info";

#[derive(Parser)]
#[command(name = "mailpost", version)]
#[command(about = "POP3 and SMTP servers over a shared local mailbox store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the POP3 retrieval server
    Pop3 {
        /// Port to listen on
        #[arg(default_value_t = mailpost_pop3::DEFAULT_PORT)]
        port: u16,

        #[command(flatten)]
        options: ServerOptions,
    },

    /// Run the SMTP submission server
    Smtp {
        /// Port to listen on
        #[arg(default_value_t = mailpost_smtp::DEFAULT_PORT)]
        port: u16,

        #[command(flatten)]
        options: ServerOptions,
    },
}

#[derive(clap::Args)]
struct ServerOptions {
    /// Mailbox base directory
    #[arg(long, default_value = DEFAULT_MAIL_DIR)]
    mail_dir: PathBuf,

    /// Credentials file, one "user password" pair per line
    #[arg(long, default_value = DEFAULT_USERS_FILE)]
    users: PathBuf,

    /// Host name announced to clients [default: the system host name]
    #[arg(long, default_value_t = system_hostname(), hide_default_value = true)]
    hostname: String,

    /// Longest command line accepted, in bytes
    #[arg(long, default_value_t = DEFAULT_LINE_CAPACITY)]
    max_line_length: usize,

    /// Answer "already deleted" instead of "no such message" for deleted
    /// POP3 messages
    #[arg(long)]
    report_deleted: bool,
}

/// Returns the machine's host name, or `localhost` if it has none.
fn system_hostname() -> String {
    let name = gethostname::gethostname().to_string_lossy().trim().to_string();
    if name.is_empty() {
        "localhost".to_string()
    } else {
        name
    }
}

impl ServerOptions {
    fn config(&self) -> mailpost_core::Result<ServerConfig> {
        let deleted_lookup = if self.report_deleted {
            DeletedLookup::Report
        } else {
            DeletedLookup::NotFound
        };
        ServerConfig::builder(self.hostname.as_str())
            .mail_dir(&self.mail_dir)
            .users_file(&self.users)
            .max_line_length(self.max_line_length)
            .deleted_lookup(deleted_lookup)
            .build()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let (protocol, port, options) = match cli.command {
        Command::Pop3 { port, options } => (Protocol::Pop3, port, options),
        Command::Smtp { port, options } => (Protocol::Smtp, port, options),
    };
    let config = options.config().context("invalid configuration")?;

    let users = UserTable::load(&config.users_file)
        .await
        .with_context(|| format!("cannot load users from {}", config.users_file.display()))?;
    let store = MailStore::new(&config.mail_dir);
    store.ensure_base().await;

    let listener = server::bind(port)
        .await
        .with_context(|| format!("cannot listen on port {port}"))?;
    info!(
        protocol = protocol.name(),
        addr = %listener.local_addr()?,
        mail_dir = %config.mail_dir.display(),
        "Starting mailpost"
    );

    server::serve(listener, protocol, Arc::new(users), store, config).await;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["mailpost", "pop3"]).unwrap();
        let Command::Pop3 { port, options } = cli.command else {
            panic!("expected pop3");
        };
        assert_eq!(port, 110);

        let config = options.config().unwrap();
        assert_eq!(config.hostname, system_hostname());
        assert!(!config.hostname.is_empty());
        assert_eq!(config.mail_dir, PathBuf::from("mail.store"));
        assert_eq!(config.users_file, PathBuf::from("users.txt"));
        assert_eq!(config.max_line_length, 1024);
        assert_eq!(config.deleted_lookup, DeletedLookup::NotFound);
    }

    #[test]
    fn test_cli_options() {
        let cli = Cli::try_parse_from([
            "mailpost",
            "smtp",
            "2525",
            "--mail-dir",
            "/srv/mail",
            "--users",
            "/etc/mailpost/users",
            "--hostname",
            "mx.example.com",
            "--max-line-length",
            "512",
            "--report-deleted",
        ])
        .unwrap();
        let Command::Smtp { port, options } = cli.command else {
            panic!("expected smtp");
        };
        assert_eq!(port, 2525);

        let config = options.config().unwrap();
        assert_eq!(config.hostname, "mx.example.com");
        assert_eq!(config.mail_dir, PathBuf::from("/srv/mail"));
        assert_eq!(config.max_line_length, 512);
        assert_eq!(config.deleted_lookup, DeletedLookup::Report);
    }

    #[test]
    fn test_cli_rejects_zero_line_length() {
        let cli = Cli::try_parse_from(["mailpost", "smtp", "--max-line-length", "0"]).unwrap();
        let Command::Smtp { options, .. } = cli.command else {
            panic!("expected smtp");
        };
        assert!(options.config().is_err());
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["mailpost"]).is_err());
    }
}
