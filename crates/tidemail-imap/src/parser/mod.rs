//! IMAP command parser.
//!
//! This module turns the bytes of one client command into a [`Command`].
//!
//! # Architecture
//!
//! The parser is split into two main components:
//!
//! - **Lexer**: Tokenizes raw bytes into strings and line ends, scanning
//!   unquoted strings with the charset of the current grammar position
//! - **Command Parser**: Picks the lexing mode per argument and builds the
//!   command
//!
//! # Example
//!
//! ```
//! use tidemail_imap::command::CommandBody;
//! use tidemail_imap::parser::CommandParser;
//!
//! let command = CommandParser::new(b"A001 SELECT INBOX\r\n").parse().unwrap();
//! assert_eq!(command.tag.as_str(), "A001");
//! assert_eq!(command.body, CommandBody::Select { mailbox: "INBOX".to_string() });
//! ```
//!
//! [`Command`]: crate::command::Command

mod command;
pub mod lexer;

pub use command::{CommandParser, peek_tag};
pub use lexer::{LexMode, Lexer, Token, TokenKind};
