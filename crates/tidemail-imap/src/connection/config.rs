//! Server configuration types.

use std::time::Duration;

use tokio_rustls::TlsAcceptor;

/// Default listen address (unprivileged IMAP port).
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:1143";

/// Default greeting text.
pub const DEFAULT_GREETING: &str = "IMAP4rev1 Service Ready";

/// Maximum line length to prevent memory exhaustion.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024; // 64 KiB

/// Maximum literal size to prevent memory exhaustion.
pub const DEFAULT_MAX_LITERAL_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// Maximum size of one command, every line and literal included.
pub const DEFAULT_MAX_COMMAND_SIZE: usize = 32 * 1024 * 1024; // 32 MiB

/// Autologout timer from RFC 3501 section 5.4.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// IMAP server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen_addr: String,
    /// Text of the `* OK` greeting.
    pub greeting: String,
    /// Close connections idle for longer than this.
    pub idle_timeout: Option<Duration>,
    /// Longest accepted command line.
    pub max_line_length: usize,
    /// Largest accepted literal.
    pub max_literal_size: usize,
    /// Largest accepted command, literals included.
    pub max_command_size: usize,
    /// Acceptor used for STARTTLS; `None` disables it.
    pub tls: Option<TlsAcceptor>,
}

impl ServerConfig {
    /// Creates a configuration listening on the given address.
    #[must_use]
    pub fn new(listen_addr: impl Into<String>) -> Self {
        ServerConfigBuilder::new().listen_addr(listen_addr).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfigBuilder::new().build()
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("greeting", &self.greeting)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_line_length", &self.max_line_length)
            .field("max_literal_size", &self.max_literal_size)
            .field("max_command_size", &self.max_command_size)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

/// Builder for server configuration.
#[derive(Clone)]
pub struct ServerConfigBuilder {
    listen_addr: String,
    greeting: String,
    idle_timeout: Option<Duration>,
    max_line_length: usize,
    max_literal_size: usize,
    max_command_size: usize,
    tls: Option<TlsAcceptor>,
}

impl ServerConfigBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_literal_size: DEFAULT_MAX_LITERAL_SIZE,
            max_command_size: DEFAULT_MAX_COMMAND_SIZE,
            tls: None,
        }
    }

    /// Sets the listen address.
    #[must_use]
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Sets the greeting text.
    #[must_use]
    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Sets the idle timeout; `None` disables it.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the maximum line length.
    #[must_use]
    pub const fn max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    /// Sets the maximum literal size.
    #[must_use]
    pub const fn max_literal_size(mut self, size: usize) -> Self {
        self.max_literal_size = size;
        self
    }

    /// Sets the maximum size of a whole command.
    #[must_use]
    pub const fn max_command_size(mut self, size: usize) -> Self {
        self.max_command_size = size;
        self
    }

    /// Enables STARTTLS with the given acceptor.
    #[must_use]
    pub fn tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            listen_addr: self.listen_addr,
            greeting: self.greeting,
            idle_timeout: self.idle_timeout,
            max_line_length: self.max_line_length,
            max_literal_size: self.max_literal_size,
            max_command_size: self.max_command_size,
            tls: self.tls,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
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
    fn test_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.greeting, "IMAP4rev1 Service Ready");
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(1800)));
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_config_new() {
        let config = ServerConfig::new("0.0.0.0:143");
        assert_eq!(config.listen_addr, "0.0.0.0:143");
        assert_eq!(config.max_literal_size, DEFAULT_MAX_LITERAL_SIZE);
        assert_eq!(config.max_command_size, DEFAULT_MAX_COMMAND_SIZE);
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::builder()
            .listen_addr("[::1]:1143")
            .greeting("hello")
            .idle_timeout(None)
            .max_line_length(100)
            .max_literal_size(10)
            .max_command_size(50)
            .build();

        assert_eq!(config.listen_addr, "[::1]:1143");
        assert_eq!(config.greeting, "hello");
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.max_line_length, 100);
        assert_eq!(config.max_literal_size, 10);
        assert_eq!(config.max_command_size, 50);
    }

    #[test]
    fn test_debug_hides_acceptor() {
        let debug = format!("{:?}", ServerConfig::default());
        assert!(debug.contains("tls: false"));
    }
}
