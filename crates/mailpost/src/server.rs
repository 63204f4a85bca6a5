//! TCP acceptor: one task per connection.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use mailpost_core::{MailStore, ServerConfig, UserDirectory};
use tokio::net::{TcpListener, TcpStream};
use tracing::{Instrument, debug, info, info_span, warn};

/// Which engine serves accepted connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Retrieval.
    Pop3,
    /// Submission.
    Smtp,
}

impl Protocol {
    /// Lowercase protocol name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pop3 => "pop3",
            Self::Smtp => "smtp",
        }
    }
}

/// Binds every interface on `port`, IPv6 first, falling back to IPv4.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    match TcpListener::bind((Ipv6Addr::UNSPECIFIED, port)).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            debug!(port, error = %e, "IPv6 bind failed, trying IPv4");
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await
        }
    }
}

/// Accepts connections forever, spawning one session task for each.
///
/// A failed accept or a failed session is logged and never stops the
/// listener.
pub async fn serve(
    listener: TcpListener,
    protocol: Protocol,
    users: Arc<dyn UserDirectory>,
    store: MailStore,
    config: ServerConfig,
) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };

        let span = info_span!("session", protocol = protocol.name(), %peer);
        let users = Arc::clone(&users);
        let store = store.clone();
        let config = config.clone();
        tokio::spawn(
            async move {
                info!("Connection accepted");
                match run_session(socket, protocol, users, store, &config).await {
                    Ok(()) => info!("Connection closed"),
                    Err(e) => warn!(error = %e, "Session failed"),
                }
            }
            .instrument(span),
        );
    }
}

async fn run_session(
    socket: TcpStream,
    protocol: Protocol,
    users: Arc<dyn UserDirectory>,
    store: MailStore,
    config: &ServerConfig,
) -> mailpost_core::Result<()> {
    match protocol {
        Protocol::Pop3 => {
            mailpost_pop3::Session::new(socket, users, store, config.into())
                .run()
                .await
        }
        Protocol::Smtp => {
            mailpost_smtp::Session::new(socket, users, store, config.into())
                .run()
                .await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailpost_core::UserTable;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn start(protocol: Protocol) -> (tempfile::TempDir, std::net::SocketAddr) {
        let dir = tempfile::tempdir().unwrap();
        let store = MailStore::new(dir.path().join("mail.store"));
        let users: UserTable = [("alice", "secret")].into_iter().collect();
        let config = ServerConfig::new("mx.example.com");

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, protocol, Arc::new(users), store, config));
        (dir, addr)
    }

    async fn exchange(addr: std::net::SocketAddr, command: &str) -> (String, String) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        let mut greeting = String::new();
        reader.read_line(&mut greeting).await.unwrap();
        write.write_all(command.as_bytes()).await.unwrap();
        let mut reply = String::new();
        reader.read_line(&mut reply).await.unwrap();
        (greeting, reply)
    }

    #[tokio::test]
    async fn test_serves_pop3() {
        let (_dir, addr) = start(Protocol::Pop3).await;
        let (greeting, reply) = exchange(addr, "QUIT\r\n").await;
        assert_eq!(greeting, "+OK POP3 server ready\r\n");
        assert_eq!(reply, "+OK goodbye\r\n");
    }

    #[tokio::test]
    async fn test_serves_smtp_concurrently() {
        let (_dir, addr) = start(Protocol::Smtp).await;

        // An idle connection must not block the next one.
        let _idle = TcpStream::connect(addr).await.unwrap();
        let (greeting, reply) = exchange(addr, "HELO client\r\n").await;
        assert_eq!(
            greeting,
            "220 mx.example.com Simple Mail Transfer Service Ready\r\n"
        );
        assert_eq!(reply, "250 mx.example.com\r\n");
    }

    #[test]
    fn test_protocol_name() {
        assert_eq!(Protocol::Pop3.name(), "pop3");
        assert_eq!(Protocol::Smtp.name(), "smtp");
    }
}
