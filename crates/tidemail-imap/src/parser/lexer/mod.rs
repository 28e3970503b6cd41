//! IMAP lexer for tokenizing client commands.
//!
//! The lexer owns its input source and exactly one byte of lookahead. Every
//! lexing function leaves the cursor on the first byte after the token it
//! produced, and the cursor only ever moves forward.
//!
//! Unquoted strings are context sensitive: the caller picks a [`LexMode`]
//! matching the grammar position, and the mode decides which bytes end the
//! scan. Quoted strings and literals are recognized in every mode.

#![allow(clippy::missing_errors_doc)]

mod charset;
mod token;

use std::io::{self, BufRead};

pub use charset::LexMode;
pub use token::{Token, TokenKind};

use crate::{Error, Result};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const SPACE: u8 = b' ';
const DOUBLE_QUOTE: u8 = b'"';
const BACKSLASH: u8 = b'\\';
const LEFT_CURLY: u8 = b'{';
const RIGHT_CURLY: u8 = b'}';

/// IMAP lexer state.
///
/// `current` holds the next unconsumed byte, or `None` once the source is
/// exhausted. Reading past a CRLF pulls the next byte from the source, so the
/// lexer is meant to run over one framed command at a time.
pub struct Lexer<R> {
    reader: R,
    current: Option<u8>,
    pos: usize,
}

impl<R: BufRead> Lexer<R> {
    /// Creates a new lexer for the given source.
    ///
    /// The cursor starts on a fake space that the first call to
    /// [`next`](Self::next) skips.
    #[must_use]
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            current: Some(SPACE),
            pos: 0,
        }
    }

    /// Returns the number of bytes read from the source.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the lookahead byte.
    #[must_use]
    pub const fn current(&self) -> Option<u8> {
        self.current
    }

    /// Moves the cursor forward by one byte.
    pub fn advance(&mut self) -> Result<()> {
        let next = loop {
            match self.reader.fill_buf() {
                Ok(buf) => break buf.first().copied(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
        };

        if next.is_some() {
            self.reader.consume(1);
            self.pos += 1;
        }
        self.current = next;
        Ok(())
    }

    /// Reads the next token, scanning unquoted strings according to `mode`.
    pub fn next(&mut self, mode: LexMode) -> Result<Token> {
        self.skip_space()?;

        match self.current {
            Some(CR) => {
                self.consume_eol()?;
                self.advance()?;
                Ok(Token::eol())
            }
            Some(DOUBLE_QUOTE) => {
                self.advance()?;
                self.quoted()
            }
            Some(LEFT_CURLY) => {
                self.advance()?;
                self.literal()
            }
            Some(_) => self.unquoted(mode),
            None => Ok(Token::invalid()),
        }
    }

    /// Reads a quoted string. The opening quote is already consumed.
    fn quoted(&mut self) -> Result<Token> {
        let mut buffer = Vec::with_capacity(16);

        loop {
            match self.current {
                Some(DOUBLE_QUOTE) => break,
                Some(byte @ (CR | LF)) => {
                    return Err(self.error(&format!(
                        "Unexpected character {:?} in quoted string",
                        char::from(byte)
                    )));
                }
                Some(BACKSLASH) => {
                    self.advance()?;
                    match self.current {
                        Some(byte) => buffer.push(byte),
                        None => return Err(self.error("Unexpected end of input in quoted string")),
                    }
                }
                Some(byte) => buffer.push(byte),
                None => return Err(self.error("Unexpected end of input in quoted string")),
            }
            self.advance()?;
        }

        // Closing quote
        self.advance()?;

        Ok(Token::string(buffer))
    }

    /// Reads a length-prefixed literal. The opening brace is already consumed.
    fn literal(&mut self) -> Result<Token> {
        let mut digits = String::with_capacity(8);

        loop {
            match self.current {
                Some(RIGHT_CURLY) => break,
                Some(byte) if byte.is_ascii_digit() => digits.push(char::from(byte)),
                Some(byte) => {
                    return Err(self.error(&format!(
                        "Unexpected character {:?} in literal length",
                        char::from(byte)
                    )));
                }
                None => return Err(self.error("Unexpected end of input in literal length")),
            }
            self.advance()?;
        }

        let length: usize = digits
            .parse()
            .map_err(|_| self.error(&format!("Invalid literal length {digits:?}")))?;

        // The right curly must be followed by the end of the line
        self.advance()?;
        if self.current != Some(CR) {
            return Err(self.error("Expected CRLF after literal length"));
        }
        self.consume_eol()?;

        let mut buffer = Vec::with_capacity(length.min(4096));
        for _ in 0..length {
            self.advance()?;
            match self.current {
                Some(byte) => buffer.push(byte),
                None => return Err(self.error("Unexpected end of input in literal")),
            }
        }

        // Step past the last literal byte
        self.advance()?;

        Ok(Token::string(buffer))
    }

    /// Reads an unquoted string using the charset of `mode`.
    fn unquoted(&mut self, mode: LexMode) -> Result<Token> {
        let mut buffer = Vec::with_capacity(16);

        while let Some(byte) = self.current {
            if !mode.accepts(byte) {
                break;
            }
            buffer.push(byte);
            self.advance()?;
        }

        if buffer.is_empty() {
            return Err(self.error(&format!("Expected {}", mode.name())));
        }

        Ok(Token::string(buffer))
    }

    /// Skips a single space or line feed.
    fn skip_space(&mut self) -> Result<()> {
        if matches!(self.current, Some(SPACE | LF)) {
            self.advance()?;
        }
        Ok(())
    }

    /// Consumes bytes up to and including the next line feed.
    ///
    /// Leaves the cursor on the line feed.
    fn consume_eol(&mut self) -> Result<()> {
        while self.current != Some(LF) {
            if self.current.is_none() {
                return Err(self.error("Expected LF before end of input"));
            }
            self.advance()?;
        }
        Ok(())
    }

    /// Creates a parse error at the current position.
    fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
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
    use proptest::prelude::*;

    use super::*;

    fn lex(input: &[u8]) -> Lexer<&[u8]> {
        Lexer::new(input)
    }

    fn string(lexer: &mut Lexer<&[u8]>, mode: LexMode) -> Vec<u8> {
        let token = lexer.next(mode).unwrap();
        assert_eq!(token.kind(), TokenKind::String);
        token.into_value()
    }

    #[test]
    fn test_tag_then_command() {
        let mut lexer = lex(b"A00001 CAPABILITY\r\n");

        assert_eq!(string(&mut lexer, LexMode::Tag), b"A00001");
        assert_eq!(lexer.current(), Some(b' '));
        assert_eq!(string(&mut lexer, LexMode::Astring), b"CAPABILITY");
        assert_eq!(lexer.next(LexMode::Any).unwrap().kind(), TokenKind::Eol);
        assert_eq!(lexer.current(), None);
    }

    #[test]
    fn test_quoted_string() {
        let mut lexer = lex(b"\"plain\"");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"plain");
    }

    #[test]
    fn test_quoted_string_escaped() {
        let mut lexer = lex(b"\"a\\\"b\"");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"a\"b");
    }

    #[test]
    fn test_quoted_string_keeps_specials() {
        let mut lexer = lex(b"\"(a b) {3} %*\" NEXT");
        assert_eq!(string(&mut lexer, LexMode::Tag), b"(a b) {3} %*");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"NEXT");
    }

    #[test]
    fn test_empty_quoted_string() {
        let mut lexer = lex(b"\"\"\r\n");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"");
        assert_eq!(lexer.next(LexMode::Any).unwrap(), Token::eol());
    }

    #[test]
    fn test_quoted_string_rejects_newline() {
        let mut lexer = lex(b"\"broken\r\n\"");
        let err = lexer.next(LexMode::Astring).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("quoted string"));
    }

    #[test]
    fn test_unterminated_quoted_string() {
        let mut lexer = lex(b"\"open");
        assert!(matches!(
            lexer.next(LexMode::Astring),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_literal() {
        let mut lexer = lex(b"{11}\r\nhello world");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"hello world");
        assert_eq!(lexer.current(), None);
    }

    #[test]
    fn test_literal_keeps_line_breaks() {
        let mut lexer = lex(b"{7}\r\na\r\nb \nc\r\n");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"a\r\nb \nc");
        assert_eq!(lexer.next(LexMode::Any).unwrap().kind(), TokenKind::Eol);
    }

    #[test]
    fn test_literal_followed_by_argument() {
        let mut lexer = lex(b"{4}\r\nuser {4}\r\npass\r\n");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"user");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"pass");
        assert_eq!(lexer.next(LexMode::Any).unwrap().kind(), TokenKind::Eol);
    }

    #[test]
    fn test_empty_literal() {
        let mut lexer = lex(b"{0}\r\n\r\n");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"");
        assert_eq!(lexer.next(LexMode::Any).unwrap().kind(), TokenKind::Eol);
    }

    #[test]
    fn test_literal_bad_length() {
        let mut lexer = lex(b"{1a}\r\nxx");
        let err = lexer.next(LexMode::Astring).unwrap_err();
        assert!(err.to_string().contains("literal length"));

        let mut lexer = lex(b"{}\r\n");
        assert!(lexer.next(LexMode::Astring).is_err());

        let mut lexer = lex(b"{5+}\r\nhello");
        assert!(lexer.next(LexMode::Astring).is_err());
    }

    #[test]
    fn test_literal_requires_crlf() {
        let mut lexer = lex(b"{5}hello");
        let err = lexer.next(LexMode::Astring).unwrap_err();
        assert!(err.to_string().contains("CRLF"));
    }

    #[test]
    fn test_short_literal() {
        let mut lexer = lex(b"{10}\r\nhello");
        let err = lexer.next(LexMode::Astring).unwrap_err();
        assert!(err.to_string().contains("end of input in literal"));
    }

    #[test]
    fn test_eol_without_lf() {
        let mut lexer = lex(b"A1\r");
        assert_eq!(string(&mut lexer, LexMode::Tag), b"A1");
        assert!(matches!(lexer.next(LexMode::Any), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_unquoted_modes() {
        let mut lexer = lex(b"A+1");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"A+1");

        let mut lexer = lex(b"A+1");
        assert_eq!(string(&mut lexer, LexMode::Tag), b"A");

        let mut lexer = lex(b"INBOX/%* rest");
        assert_eq!(string(&mut lexer, LexMode::ListMailbox), b"INBOX/%*");

        let mut lexer = lex(b"INBOX/%* rest");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"INBOX/");

        let mut lexer = lex(b"BODY[1]<0.5>");
        assert_eq!(string(&mut lexer, LexMode::Any), b"BODY[1]<0.5>");
    }

    #[test]
    fn test_empty_unquoted_is_rejected() {
        for (input, mode) in [
            (&b"*"[..], LexMode::Astring),
            (b"+abc", LexMode::Tag),
            (b"(x)", LexMode::ListMailbox),
            (b"  two spaces", LexMode::Any),
            (b" \x01", LexMode::Any),
        ] {
            let mut lexer = lex(input);
            let err = lexer.next(mode).unwrap_err();
            assert!(
                err.to_string().contains(&format!("Expected {}", mode.name())),
                "{err}"
            );
        }
    }

    #[test]
    fn test_end_of_input() {
        let mut lexer = lex(b"");
        assert_eq!(lexer.next(LexMode::Any).unwrap(), Token::invalid());

        let mut lexer = lex(b"A1 NOOP\r\n");
        assert_eq!(string(&mut lexer, LexMode::Tag), b"A1");
        assert_eq!(string(&mut lexer, LexMode::Astring), b"NOOP");
        assert_eq!(lexer.next(LexMode::Any).unwrap().kind(), TokenKind::Eol);
        assert_eq!(lexer.next(LexMode::Any).unwrap().kind(), TokenKind::Invalid);
    }

    #[test]
    fn test_single_separator_skip() {
        // Only one separator byte is skipped per token
        let mut lexer = lex(b"a\nb");
        assert_eq!(string(&mut lexer, LexMode::Any), b"a");
        assert_eq!(string(&mut lexer, LexMode::Any), b"b");
    }

    #[test]
    fn test_error_position() {
        let mut lexer = lex(b"A1 \"x\ny\"");
        lexer.next(LexMode::Tag).unwrap();
        match lexer.next(LexMode::Astring) {
            Err(Error::Parse { position, .. }) => assert_eq!(position, 6),
            other => panic!("Expected parse error, got {other:?}"),
        }
    }

    fn escape(s: &str) -> String {
        let mut quoted = String::from("\"");
        for c in s.chars() {
            if c == '"' || c == '\\' {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    }

    proptest! {
        #[test]
        fn quoted_strings_unescape(content in "[ -~]{0,64}") {
            let quoted = escape(&content);
            let mut lexer = Lexer::new(quoted.as_bytes());
            let token = lexer.next(LexMode::Astring).unwrap();
            prop_assert_eq!(token.value(), content.as_bytes());
            prop_assert_eq!(lexer.current(), None);
        }

        #[test]
        fn literals_are_binary_safe(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut input = format!("{{{}}}\r\n", data.len()).into_bytes();
            input.extend_from_slice(&data);
            input.extend_from_slice(b" NEXT");

            let mut lexer = Lexer::new(&input[..]);
            let token = lexer.next(LexMode::Astring).unwrap();
            prop_assert_eq!(token.value(), &data[..]);
            let next = lexer.next(LexMode::Astring).unwrap();
            prop_assert_eq!(next.value(), &b"NEXT"[..]);
        }

        #[test]
        fn unquoted_tokens_are_never_empty(
            input in prop::collection::vec(any::<u8>(), 0..32),
            mode in prop_oneof![
                Just(LexMode::Astring),
                Just(LexMode::Tag),
                Just(LexMode::ListMailbox),
                Just(LexMode::Any),
            ],
        ) {
            let mut lexer = Lexer::new(&input[..]);
            if let Ok(token) = lexer.next(mode) {
                let starts_quoted = matches!(input.first(), Some(b'"' | b'{'));
                if token.kind() == TokenKind::String && !starts_quoted {
                    prop_assert!(!token.value().is_empty());
                    prop_assert!(token.value().iter().all(|&b| mode.accepts(b)));
                }
            }
        }
    }
}
