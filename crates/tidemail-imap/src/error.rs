//! Error types for the IMAP server engine.

use thiserror::Error;

use crate::mailstore::StoreError;

/// Errors that can occur while serving an IMAP connection.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the client stream or the lexer source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration or handshake error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Certificate or key file could not be decoded.
    #[error("PEM error: {0}")]
    Pem(#[from] rustls::pki_types::pem::Error),

    /// Malformed client input.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// The backing mail store failed.
    #[error("Mailstore error: {0}")]
    Store(#[from] StoreError),

    /// Command is not legal in the current session state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Client announced a literal larger than the configured limit.
    #[error("literal too large: {size} bytes (max {max})")]
    LiteralTooLarge {
        /// Announced literal size.
        size: usize,
        /// Configured limit.
        max: usize,
        /// Command bytes received before the literal.
        partial: Vec<u8>,
    },

    /// Framing violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
