//! TCP accept loop and per-connection driver.
//!
//! Every accepted connection gets its own task and [`Session`]. The driver
//! reads one framed command at a time, hands it to the session and writes the
//! response back. STARTTLS is carried out here, between two commands, since
//! the session itself never touches the socket.

#![allow(clippy::missing_errors_doc)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use super::config::ServerConfig;
use super::framed::FramedStream;
use super::stream::ImapStream;
use crate::command::CAPABILITIES;
use crate::mailstore::{Authenticator, Mailstore};
use crate::parser::peek_tag;
use crate::protocol::{Response, Session};
use crate::types::Tag;
use crate::{Error, Result};

/// Why a session driver returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent LOGOUT.
    Logout,
    /// The client closed the connection.
    Closed,
    /// The client stayed silent past the idle timeout.
    Timeout,
    /// The server refused to go on (line or command too long).
    Rejected,
    /// STARTTLS was accepted; the stream must be upgraded.
    StartTls,
}

/// IMAP server.
pub struct Server {
    config: Arc<ServerConfig>,
    store: Arc<dyn Mailstore>,
    authenticator: Arc<dyn Authenticator>,
    next_id: AtomicU64,
}

impl Server {
    /// Creates a server.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn Mailstore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            authenticator,
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address and serves until the listener fails.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        self.serve(listener).await
    }

    /// Serves connections accepted from `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "listening");
        let server = Arc::new(self);

        loop {
            let (tcp, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(?e, "accept failed");
                    continue;
                }
            };

            let id = server.next_id.fetch_add(1, Ordering::Relaxed);
            let span = tracing::info_span!("session", id, %peer);
            let server = Arc::clone(&server);

            tokio::spawn(
                async move {
                    match server.handle_connection(tcp, peer, id).await {
                        Ok(end) => tracing::info!(?end, "connection finished"),
                        Err(e) => tracing::warn!(?e, "connection failed"),
                    }
                }
                .instrument(span),
            );
        }
    }

    async fn handle_connection(
        &self,
        tcp: TcpStream,
        peer: SocketAddr,
        id: u64,
    ) -> Result<SessionEnd> {
        tracing::info!(%peer, "accepted connection");

        let store = Arc::clone(&self.store);
        let mut session = Session::new(id, store, Arc::clone(&self.authenticator))
            .with_starttls(self.config.tls.is_some())
            .with_span(tracing::Span::current());

        let mut framed = self.framed(ImapStream::plain(tcp));
        framed.write_raw(greeting(&self.config).as_bytes()).await?;

        loop {
            match serve_session(&mut framed, &mut session, &self.config).await? {
                SessionEnd::StartTls => {
                    let acceptor = self.config.tls.as_ref().ok_or_else(|| {
                        Error::InvalidState("STARTTLS without TLS configuration".to_string())
                    })?;
                    let stream = framed.into_inner().upgrade(acceptor).await?;
                    session.set_tls_active();
                    tracing::info!("TLS established");
                    framed = self.framed(stream);
                }
                end => return Ok(end),
            }
        }
    }

    fn framed(&self, stream: ImapStream) -> FramedStream<ImapStream> {
        FramedStream::new(stream)
            .with_limits(self.config.max_line_length, self.config.max_literal_size)
            .with_max_command_size(self.config.max_command_size)
    }
}

/// Builds the untagged greeting sent when a client connects.
#[must_use]
pub fn greeting(config: &ServerConfig) -> String {
    format!("* OK [CAPABILITY {CAPABILITIES}] {}\r\n", config.greeting)
}

/// Drives one session over an already greeted stream.
///
/// Returns when the session ends or when the stream has to be replaced
/// ([`SessionEnd::StartTls`]). I/O errors are returned as they are; protocol
/// problems are answered on the wire.
pub async fn serve_session<S>(
    framed: &mut FramedStream<S>,
    session: &mut Session,
    config: &ServerConfig,
) -> Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let read = match config.idle_timeout {
            Some(timeout) => {
                if let Ok(read) = tokio::time::timeout(timeout, framed.read_command()).await {
                    read
                } else {
                    tracing::info!(?timeout, "idle timeout");
                    framed
                        .write_raw(b"* BYE Autologout; idle for too long\r\n")
                        .await?;
                    return Ok(SessionEnd::Timeout);
                }
            }
            None => framed.read_command().await,
        };

        let input = match read {
            Ok(Some(input)) => input,
            Ok(None) => return Ok(SessionEnd::Closed),
            Err(Error::LiteralTooLarge { size, max, partial }) => {
                let tag = peek_tag(&partial).unwrap_or_else(Tag::untagged);
                tracing::warn!(%tag, size, max, "refused literal");
                framed
                    .write_response(&Response::bad(tag, "Literal too large"))
                    .await?;
                continue;
            }
            Err(Error::Protocol(message)) => {
                tracing::warn!(%message, "closing connection");
                framed
                    .write_raw(format!("* BYE {message}\r\n").as_bytes())
                    .await?;
                return Ok(SessionEnd::Rejected);
            }
            Err(e) => return Err(e),
        };

        let response = session.handle(&input);
        framed.write_response(&response).await?;

        if session.is_closed() {
            return Ok(SessionEnd::Logout);
        }
        if session.take_tls_request() {
            return Ok(SessionEnd::StartTls);
        }
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
    use std::time::Duration;

    use tokio_test::io::Builder;

    use super::*;
    use crate::protocol::tests::session;

    async fn drive(mock: tokio_test::io::Mock, config: &ServerConfig) -> SessionEnd {
        let mut session = session();
        let mut framed = FramedStream::new(mock)
            .with_limits(config.max_line_length, config.max_literal_size)
            .with_max_command_size(config.max_command_size);
        serve_session(&mut framed, &mut session, config).await.unwrap()
    }

    #[test]
    fn test_greeting() {
        assert_eq!(
            greeting(&ServerConfig::default()),
            "* OK [CAPABILITY IMAP4rev1 STARTTLS] IMAP4rev1 Service Ready\r\n"
        );
    }

    #[tokio::test]
    async fn test_capability_then_logout() {
        let mock = Builder::new()
            .read(b"A1 CAPABILITY\r\n")
            .write(b"* CAPABILITY IMAP4rev1 STARTTLS\r\nA1 OK CAPABILITY completed\r\n")
            .read(b"A2 LOGOUT\r\n")
            .write(b"* BYE IMAP4rev1 Server logging out\r\nA2 OK LOGOUT completed\r\n")
            .build();

        assert_eq!(drive(mock, &ServerConfig::default()).await, SessionEnd::Logout);
    }

    #[tokio::test]
    async fn test_login_with_literal() {
        let mock = Builder::new()
            .read(b"A1 LOGIN {4}\r\n")
            .write(b"+ Ready for literal data\r\n")
            .read(b"user pass\r\n")
            .write(b"A1 OK LOGIN completed\r\n")
            .build();

        assert_eq!(drive(mock, &ServerConfig::default()).await, SessionEnd::Closed);
    }

    #[tokio::test]
    async fn test_literal_too_large_keeps_connection() {
        let config = ServerConfig::builder().max_literal_size(10).build();
        let mock = Builder::new()
            .read(b"A1 LOGIN {11}\r\n")
            .write(b"A1 BAD Literal too large\r\n")
            .read(b"A2 NOOP\r\n")
            .write(b"A2 OK NOOP completed\r\n")
            .build();

        assert_eq!(drive(mock, &config).await, SessionEnd::Closed);
    }

    #[tokio::test]
    async fn test_line_too_long_closes() {
        let config = ServerConfig::builder().max_line_length(16).build();
        let mock = Builder::new()
            .read(b"A1 LOGIN averyveryverylongname x\r\n")
            .write(b"* BYE Line too long\r\n")
            .build();

        assert_eq!(drive(mock, &config).await, SessionEnd::Rejected);
    }

    #[tokio::test]
    async fn test_command_too_long_closes() {
        let config = ServerConfig::builder().max_command_size(24).build();
        let mock = Builder::new()
            .read(b"A1 LOGIN {4}\r\n")
            .write(b"+ Ready for literal data\r\n")
            .read(b"fred secretpassword\r\n")
            .write(b"* BYE Command too long\r\n")
            .build();

        assert_eq!(drive(mock, &config).await, SessionEnd::Rejected);
    }

    #[tokio::test]
    async fn test_parse_error_recovers() {
        let mock = Builder::new()
            .read(b"A1 BOGUS\r\n")
            .write(b"A1 BAD Protocol error at position 9: Unknown command BOGUS\r\n")
            .read(b"A2 NOOP\r\n")
            .write(b"A2 OK NOOP completed\r\n")
            .build();

        assert_eq!(drive(mock, &ServerConfig::default()).await, SessionEnd::Closed);
    }

    #[tokio::test]
    async fn test_starttls_request_returns() {
        let mut session = session().with_starttls(true);
        let mock = Builder::new()
            .read(b"A1 STARTTLS\r\n")
            .write(b"A1 OK Begin TLS negotiation now\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let end = serve_session(&mut framed, &mut session, &ServerConfig::default())
            .await
            .unwrap();
        assert_eq!(end, SessionEnd::StartTls);
        assert!(!session.take_tls_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let config = ServerConfig::builder()
            .idle_timeout(Some(Duration::from_secs(60)))
            .build();
        let mock = Builder::new()
            .write(b"* BYE Autologout; idle for too long\r\n")
            .build();

        assert_eq!(drive(mock, &config).await, SessionEnd::Timeout);
    }
}
