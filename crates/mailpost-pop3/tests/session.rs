//! End-to-end tests driving a POP3 session over an in-memory stream.

use std::sync::Arc;

use mailpost_core::{DeletedLookup, MailStore, RecipientSet, UserTable};
use mailpost_pop3::{Session, SessionConfig};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

struct Client {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Client {
    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line
    }

    async fn send(&mut self, command: &str) {
        self.writer.write_all(command.as_bytes()).await.unwrap();
        self.writer.write_all(b"\r\n").await.unwrap();
    }

    async fn cmd(&mut self, command: &str) -> String {
        self.send(command).await;
        self.line().await
    }

    /// Reads body lines up to and excluding the terminating ".".
    async fn body(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            assert!(!line.is_empty(), "stream ended inside a multi-line response");
            if line == ".\r\n" {
                return lines;
            }
            lines.push(line);
        }
    }

    async fn login(&mut self) {
        assert!(self.cmd("USER alice").await.starts_with("+OK"));
        assert!(self.cmd("PASS secret").await.starts_with("+OK"));
    }
}

struct Fixture {
    _dir: TempDir,
    store: MailStore,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = MailStore::new(dir.path().join("mail.store"));
        Self { _dir: dir, store }
    }

    async fn deliver(&self, body: &str, user: &str) {
        let spooled = self.store.spool([body.as_bytes()]).await.unwrap();
        let recipients: RecipientSet = [user].into_iter().collect();
        assert_eq!(self.store.deliver(spooled.path(), &recipients).await.len(), 1);
    }

    async fn connect(&self) -> (Client, JoinHandle<mailpost_core::Result<()>>) {
        self.connect_with(SessionConfig::default()).await
    }

    async fn connect_with(
        &self,
        config: SessionConfig,
    ) -> (Client, JoinHandle<mailpost_core::Result<()>>) {
        let users: UserTable = [("alice", "secret"), ("bob", "hunter2")].into_iter().collect();
        let (client, server) = tokio::io::duplex(16 * 1024);
        let session = Session::new(server, Arc::new(users), self.store.clone(), config);
        let handle = tokio::spawn(session.run());

        let (read, write) = tokio::io::split(client);
        let mut client = Client {
            reader: BufReader::new(read),
            writer: write,
        };
        assert_eq!(client.line().await, "+OK POP3 server ready\r\n");
        (client, handle)
    }
}

#[tokio::test]
async fn test_retrieval_scenario_on_empty_mailbox() {
    let fixture = Fixture::new();
    let (mut client, handle) = fixture.connect().await;

    assert_eq!(client.cmd("USER alice").await, "+OK alice accepted\r\n");
    assert_eq!(
        client.cmd("PASS secret").await,
        "+OK maildrop has 0 messages (0 octets)\r\n"
    );
    assert_eq!(client.cmd("STAT").await, "+OK 0 0\r\n");
    assert_eq!(client.cmd("RETR 0").await, "-ERR no such message\r\n");
    assert_eq!(client.cmd("RETR 1").await, "-ERR no such message\r\n");
    assert_eq!(client.cmd("QUIT").await, "+OK goodbye\r\n");
    assert_eq!(client.line().await, "");

    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_commands_out_of_sequence() {
    let fixture = Fixture::new();
    let (mut client, handle) = fixture.connect().await;

    assert!(client.cmd("STAT").await.starts_with("-ERR"));
    assert!(client.cmd("PASS secret").await.starts_with("-ERR"));
    assert_eq!(client.cmd("NOOP").await, "+OK\r\n");
    assert!(client.cmd("RSET").await.starts_with("-ERR"));
    assert!(client.cmd("USER").await.starts_with("-ERR"));
    assert!(client.cmd("USER mallory").await.starts_with("-ERR"));

    assert!(client.cmd("user ALICE").await.starts_with("+OK"));
    assert!(client.cmd("USER bob").await.starts_with("-ERR"));
    assert_eq!(client.cmd("PASS wrong").await, "-ERR invalid password\r\n");
    assert!(client.cmd("pass secret").await.starts_with("+OK"));
    assert!(client.cmd("USER alice").await.starts_with("-ERR"));
    assert_eq!(client.cmd("NOOP").await, "+OK\r\n");
    assert_eq!(client.cmd("XTND").await, "-ERR unrecognized command\r\n");

    client.cmd("QUIT").await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_quit_before_login() {
    let fixture = Fixture::new();
    let (mut client, handle) = fixture.connect().await;
    assert_eq!(client.cmd("QUIT").await, "+OK goodbye\r\n");
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_list_and_uidl() {
    let fixture = Fixture::new();
    fixture.deliver("first\r\n", "alice").await;
    fixture.deliver("second message\r\n", "alice").await;
    fixture.deliver("not for alice\r\n", "bob").await;
    let (mut client, handle) = fixture.connect().await;
    client.login().await;

    assert_eq!(client.cmd("STAT").await, "+OK 2 23\r\n");
    assert_eq!(client.cmd("LIST").await, "+OK 2 messages (23 octets)\r\n");
    assert_eq!(client.body().await, vec!["1 7\r\n", "2 16\r\n"]);
    assert_eq!(client.cmd("LIST 2").await, "+OK 2 16\r\n");
    assert_eq!(client.cmd("LIST 3").await, "-ERR no such message\r\n");
    assert_eq!(client.cmd("LIST 0").await, "-ERR no such message\r\n");
    assert_eq!(client.cmd("LIST two").await, "-ERR invalid message number\r\n");

    assert!(client.cmd("UIDL").await.starts_with("+OK"));
    let ids = client.body().await;
    assert_eq!(ids.len(), 2);
    assert!(ids[0].starts_with("1 0."));
    assert!(ids[1].starts_with("2 1."));
    assert_eq!(client.cmd("UIDL 1").await, format!("+OK {}", ids[0]));
    assert_eq!(client.cmd("UIDL 3").await, "-ERR no such message\r\n");

    client.cmd("QUIT").await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_uidl_changes_when_number_is_reused() {
    let fixture = Fixture::new();
    fixture.deliver("old message\r\n", "alice").await;

    let (mut client, handle) = fixture.connect().await;
    client.login().await;
    let first = client.cmd("UIDL 1").await;
    assert!(first.starts_with("+OK 1 0."));
    assert_eq!(client.cmd("DELE 1").await, "+OK message 1 deleted\r\n");
    client.cmd("QUIT").await;
    handle.await.unwrap().unwrap();

    fixture.deliver("new message\r\n", "alice").await;
    let (mut client, handle) = fixture.connect().await;
    client.login().await;
    let second = client.cmd("UIDL 1").await;
    assert!(second.starts_with("+OK 1 0."));
    assert_ne!(first, second);

    client.cmd("QUIT").await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_retr_normalizes_and_stuffs_lines() {
    let fixture = Fixture::new();
    let body = "Subject: dots\n.hidden\r\nbody\n.\n";
    fixture.deliver(body, "alice").await;
    let (mut client, handle) = fixture.connect().await;
    client.login().await;

    assert_eq!(
        client.cmd("RETR 1").await,
        format!("+OK {} octets\r\n", body.len())
    );
    assert_eq!(
        client.body().await,
        vec!["Subject: dots\r\n", "..hidden\r\n", "body\r\n", "..\r\n"]
    );
    assert_eq!(client.cmd("RETR").await, "-ERR missing message number\r\n");

    client.cmd("QUIT").await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_dele_is_applied_at_quit() {
    let fixture = Fixture::new();
    fixture.deliver("zero\r\n", "alice").await;
    fixture.deliver("one\r\n", "alice").await;
    let (mut client, handle) = fixture.connect().await;
    client.login().await;

    assert_eq!(client.cmd("DELE 1").await, "+OK message 1 deleted\r\n");
    assert_eq!(client.cmd("DELE 1").await, "-ERR no such message\r\n");
    assert_eq!(client.cmd("RETR 1").await, "-ERR no such message\r\n");
    assert_eq!(client.cmd("STAT").await, "+OK 1 5\r\n");
    assert_eq!(client.cmd("LIST").await, "+OK 1 messages (5 octets)\r\n");
    assert_eq!(client.body().await, vec!["2 5\r\n"]);

    // Still on disk until the session ends.
    assert_eq!(fixture.store.list_mailbox_messages("alice").await.count(), 2);

    client.cmd("QUIT").await;
    handle.await.unwrap().unwrap();

    let remaining = fixture.store.list_mailbox_messages("alice").await;
    assert_eq!(remaining.count(), 1);
    assert_eq!(remaining.message_at(0).unwrap().name(), "1");
}

#[tokio::test]
async fn test_rset_restores_flags() {
    let fixture = Fixture::new();
    fixture.deliver("zero\r\n", "alice").await;
    fixture.deliver("one\r\n", "alice").await;
    let (mut client, handle) = fixture.connect().await;
    client.login().await;

    client.cmd("DELE 1").await;
    client.cmd("DELE 2").await;
    assert_eq!(client.cmd("STAT").await, "+OK 0 0\r\n");
    assert_eq!(client.cmd("RSET").await, "+OK 2 messages restored\r\n");
    assert_eq!(client.cmd("STAT").await, "+OK 2 11\r\n");

    client.cmd("QUIT").await;
    handle.await.unwrap().unwrap();
    assert_eq!(fixture.store.list_mailbox_messages("alice").await.count(), 2);
}

#[tokio::test]
async fn test_deletions_released_when_client_disconnects() {
    let fixture = Fixture::new();
    fixture.deliver("zero\r\n", "alice").await;
    let (mut client, handle) = fixture.connect().await;
    client.login().await;
    client.cmd("DELE 1").await;

    drop(client);
    handle.await.unwrap().unwrap();
    assert!(fixture.store.list_mailbox_messages("alice").await.is_empty());
}

#[tokio::test]
async fn test_deleted_lookup_can_be_reported() {
    let fixture = Fixture::new();
    fixture.deliver("zero\r\n", "alice").await;
    let config = SessionConfig {
        deleted_lookup: DeletedLookup::Report,
        ..SessionConfig::default()
    };
    let (mut client, handle) = fixture.connect_with(config).await;
    client.login().await;

    client.cmd("DELE 1").await;
    assert_eq!(client.cmd("RETR 1").await, "-ERR message 1 already deleted\r\n");
    assert_eq!(client.cmd("DELE 1").await, "-ERR message 1 already deleted\r\n");
    assert_eq!(client.cmd("RETR 2").await, "-ERR no such message\r\n");

    client.cmd("QUIT").await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_overlong_line_is_rejected_and_resynced() {
    let fixture = Fixture::new();
    let config = SessionConfig {
        max_line_length: 16,
        ..SessionConfig::default()
    };
    let (mut client, handle) = fixture.connect_with(config).await;

    assert_eq!(
        client.cmd(&format!("USER {}", "x".repeat(60))).await,
        "-ERR line too long\r\n"
    );
    assert_eq!(client.cmd("USER alice").await, "+OK alice accepted\r\n");

    client.cmd("QUIT").await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unterminated_final_command_is_processed() {
    let fixture = Fixture::new();
    let (mut client, handle) = fixture.connect().await;

    client.writer.write_all(b"QUIT").await.unwrap();
    client.writer.shutdown().await.unwrap();
    assert_eq!(client.line().await, "+OK goodbye\r\n");
    handle.await.unwrap().unwrap();
}
