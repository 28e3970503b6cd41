//! IMAP connection management.
//!
//! This module provides the network side of the server:
//! - Configuration (listen address, limits, TLS)
//! - TLS/plaintext stream abstraction
//! - Framed I/O with literal continuation requests
//! - Accept loop and per-connection session driver

mod config;
mod framed;
mod server;
mod stream;

pub use config::{
    DEFAULT_GREETING, DEFAULT_IDLE_TIMEOUT, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_COMMAND_SIZE,
    DEFAULT_MAX_LINE_LENGTH, DEFAULT_MAX_LITERAL_SIZE, ServerConfig, ServerConfigBuilder,
};
pub use framed::FramedStream;
pub use server::{Server, SessionEnd, greeting, serve_session};
pub use stream::{ImapStream, load_tls_acceptor};
