//! Command parser.
//!
//! Drives the lexer over one framed command, choosing the lexing mode for
//! each grammar position, and builds a [`Command`].

#![allow(clippy::missing_errors_doc)]

use super::lexer::{LexMode, Lexer, TokenKind};
use crate::command::{Command, CommandBody};
use crate::types::Tag;
use crate::{Error, Result};

/// Parser for a single client command.
///
/// Remembers the tag as soon as it has been read, so a failure later in the
/// line can still be answered with the right tag.
pub struct CommandParser<'a> {
    lexer: Lexer<&'a [u8]>,
    tag: Option<Tag>,
}

impl<'a> CommandParser<'a> {
    /// Creates a parser over one framed command.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(input),
            tag: None,
        }
    }

    /// Returns the tag, if it has been read.
    #[must_use]
    pub const fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// Parses the command.
    pub fn parse(&mut self) -> Result<Command> {
        let tag = Tag::new(self.string(LexMode::Tag, "tag")?);
        self.tag = Some(tag.clone());

        let name = self
            .string(LexMode::Astring, "command name")?
            .to_ascii_uppercase();

        let body = match name.as_str() {
            "CAPABILITY" => CommandBody::Capability,
            "NOOP" => CommandBody::Noop,
            "LOGOUT" => CommandBody::Logout,
            "STARTTLS" => CommandBody::StartTls,
            "LOGIN" => {
                let username = self.string(LexMode::Astring, "username")?;
                let password = self.string(LexMode::Astring, "password")?;
                CommandBody::Login { username, password }
            }
            "SELECT" => CommandBody::Select {
                mailbox: self.string(LexMode::Astring, "mailbox")?,
            },
            "EXAMINE" => CommandBody::Examine {
                mailbox: self.string(LexMode::Astring, "mailbox")?,
            },
            "LIST" => {
                let reference = self.string(LexMode::Astring, "reference")?;
                let pattern = self.string(LexMode::ListMailbox, "mailbox pattern")?;
                CommandBody::List { reference, pattern }
            }
            "CLOSE" => CommandBody::Close,
            _ => return Err(self.error(format!("Unknown command {name}"))),
        };

        self.expect_eol()?;
        Ok(Command { tag, body })
    }

    /// Reads a string token as UTF-8 text.
    fn string(&mut self, mode: LexMode, what: &str) -> Result<String> {
        let token = self.lexer.next(mode)?;
        match token.kind() {
            TokenKind::String => String::from_utf8(token.into_value())
                .map_err(|_| self.error(format!("Invalid UTF-8 in {what}"))),
            TokenKind::Eol => Err(self.error(format!("Missing {what}"))),
            TokenKind::Invalid => Err(self.error(format!(
                "Unexpected end of input, expected {what}"
            ))),
        }
    }

    /// Expects the end of the command line.
    fn expect_eol(&mut self) -> Result<()> {
        let token = self.lexer.next(LexMode::Any)?;
        match token.kind() {
            TokenKind::Eol => Ok(()),
            TokenKind::String => Err(self.error("Unexpected extra arguments".to_string())),
            TokenKind::Invalid => Err(self.error("Missing CRLF at end of command".to_string())),
        }
    }

    fn error(&self, message: String) -> Error {
        Error::Parse {
            position: self.lexer.position(),
            message,
        }
    }
}

/// Reads just the tag of a command, for answering commands that could not be
/// framed completely.
#[must_use]
pub fn peek_tag(input: &[u8]) -> Option<Tag> {
    CommandParser::new(input)
        .string(LexMode::Tag, "tag")
        .ok()
        .map(Tag::new)
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

    fn parse(input: &[u8]) -> Result<Command> {
        CommandParser::new(input).parse()
    }

    #[test]
    fn test_simple_commands() {
        let command = parse(b"A00001 CAPABILITY\r\n").unwrap();
        assert_eq!(command, Command::new("A00001", CommandBody::Capability));

        assert_eq!(parse(b"a noop\r\n").unwrap().body, CommandBody::Noop);
        assert_eq!(parse(b"a Logout\r\n").unwrap().body, CommandBody::Logout);
        assert_eq!(parse(b"a STARTTLS\r\n").unwrap().body, CommandBody::StartTls);
        assert_eq!(parse(b"a CLOSE\r\n").unwrap().body, CommandBody::Close);
    }

    #[test]
    fn test_login_argument_forms() {
        let expected = CommandBody::Login {
            username: "fred smith".to_string(),
            password: "p\"w".to_string(),
        };
        assert_eq!(
            parse(b"A1 LOGIN \"fred smith\" \"p\\\"w\"\r\n").unwrap().body,
            expected
        );
        assert_eq!(
            parse(b"A1 LOGIN {10}\r\nfred smith {3}\r\np\"w\r\n").unwrap().body,
            expected
        );
        assert_eq!(
            parse(b"A1 LOGIN fred+1 secret\r\n").unwrap().body,
            CommandBody::Login {
                username: "fred+1".to_string(),
                password: "secret".to_string(),
            }
        );
    }

    #[test]
    fn test_select_and_examine() {
        assert_eq!(
            parse(b"A2 SELECT INBOX\r\n").unwrap().body,
            CommandBody::Select {
                mailbox: "INBOX".to_string()
            }
        );
        assert_eq!(
            parse(b"A2 EXAMINE \"Sent Items\"\r\n").unwrap().body,
            CommandBody::Examine {
                mailbox: "Sent Items".to_string()
            }
        );
    }

    #[test]
    fn test_list_uses_list_mailbox_charset() {
        assert_eq!(
            parse(b"A3 LIST \"\" INBOX/%\r\n").unwrap().body,
            CommandBody::List {
                reference: String::new(),
                pattern: "INBOX/%".to_string(),
            }
        );
        assert_eq!(
            parse(b"A3 LIST ~/Mail *\r\n").unwrap().body,
            CommandBody::List {
                reference: "~/Mail".to_string(),
                pattern: "*".to_string(),
            }
        );
    }

    #[test]
    fn test_tag_is_kept_after_failure() {
        let mut parser = CommandParser::new(b"A4 SELECT\r\n");
        let err = parser.parse().unwrap_err();
        assert!(err.to_string().contains("Missing mailbox"));
        assert_eq!(parser.tag().unwrap().as_str(), "A4");
    }

    #[test]
    fn test_unknown_command() {
        let mut parser = CommandParser::new(b"A5 FETCH 1 BODY[]\r\n");
        let err = parser.parse().unwrap_err();
        assert!(err.to_string().contains("Unknown command FETCH"));
        assert_eq!(parser.tag().unwrap().as_str(), "A5");
    }

    #[test]
    fn test_extra_arguments() {
        let err = parse(b"A6 NOOP now\r\n").unwrap_err();
        assert!(err.to_string().contains("Unexpected extra arguments"));
    }

    #[test]
    fn test_truncated_command() {
        let mut parser = CommandParser::new(b"A9 LOGIN fred");
        let err = parser.parse().unwrap_err();
        assert!(err.to_string().contains("Unexpected end of input, expected password"));
        assert_eq!(parser.tag().unwrap().as_str(), "A9");

        // A command must end with CRLF
        let err = parse(b"A9 NOOP").unwrap_err();
        assert!(err.to_string().contains("Missing CRLF"));
    }

    #[test]
    fn test_missing_tag() {
        let mut parser = CommandParser::new(b"\r\n");
        assert!(parser.parse().is_err());
        assert!(parser.tag().is_none());
    }

    #[test]
    fn test_invalid_utf8() {
        let err = parse(b"A7 SELECT {2}\r\n\xff\xfe\r\n").unwrap_err();
        assert!(err.to_string().contains("Invalid UTF-8 in mailbox"));
    }

    #[test]
    fn test_peek_tag() {
        assert_eq!(peek_tag(b"A8 LOGIN {99999999}\r\n"), Some(Tag::new("A8")));
        assert_eq!(peek_tag(b"(oops"), None);
    }
}
