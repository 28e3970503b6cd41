//! # tidemail-imap
//!
//! An IMAP4rev1 (RFC 3501) server engine: a mode-aware lexer, a per-connection
//! session state machine, a closed command set and a tagged response builder,
//! with a tokio transport that frames commands and upgrades to TLS.
//!
//! ## Features
//!
//! - **Mode-aware lexing**: Unquoted strings are scanned with the charset of
//!   their grammar position (tag, astring, list-mailbox)
//! - **Literals**: Synchronizing literals with continuation requests, binary
//!   safe and bounded in size
//! - **Explicit session state**: A mailbox is attached exactly when the
//!   session is in the selected state
//! - **Pluggable storage**: Mailbox metadata and credentials come from the
//!   [`Mailstore`] and [`Authenticator`] traits
//! - **TLS via rustls**: STARTTLS without an OpenSSL dependency
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tidemail_imap::{MemoryStore, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> tidemail_imap::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     store.add_user("user", "pass")?;
//!     store.create_mailbox("INBOX")?;
//!
//!     let server = Server::new(ServerConfig::default(), store.clone(), store);
//!     server.run().await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! ┌─────────────────────┐
//! │  NotAuthenticated   │ ─── LOGIN ───→ Authenticated
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    Authenticated    │ ─── SELECT/EXAMINE ───→ Selected
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │      Selected       │ ─── CLOSE ───→ Authenticated
//! └─────────────────────┘
//! ```
//!
//! LOGOUT moves any state to Logout, after which the connection is closed.
//!
//! ## Modules
//!
//! - [`command`]: Command model and execution
//! - [`connection`]: Framing, TLS and the accept loop
//! - [`mailstore`]: Storage and authentication traits, in-memory store
//! - [`parser`]: Lexer and command parser
//! - [`protocol`]: Session state machine and responses
//! - [`types`]: Core IMAP types (tags, mailboxes)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod mailstore;
pub mod parser;
pub mod protocol;
pub mod types;

pub use command::{CAPABILITIES, Command, CommandBody};
pub use connection::{FramedStream, ImapStream, Server, ServerConfig, ServerConfigBuilder};
pub use error::{Error, Result};
pub use mailstore::{Authenticator, Mailstore, MemoryStore, StoreError};
pub use parser::{CommandParser, LexMode, Lexer, Token, TokenKind};
pub use protocol::{Response, SelectedState, Session, SessionState, Status};
pub use types::{Mailbox, MailboxAttribute, Tag};
