//! Framed I/O for the server side of IMAP.
//!
//! Clients send CRLF-terminated lines that may announce synchronizing
//! literals (`{n}\r\n`). Before the client may send the literal bytes the
//! server has to answer with a continuation request. This module reads one
//! complete command, literals included, so the lexer never waits on the
//! network.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::config::{DEFAULT_MAX_COMMAND_SIZE, DEFAULT_MAX_LINE_LENGTH, DEFAULT_MAX_LITERAL_SIZE};
use crate::protocol::Response;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Continuation request sent before a literal is read.
const CONTINUATION: &[u8] = b"+ Ready for literal data\r\n";

/// Framed connection for the IMAP server.
///
/// Handles command reading with literal support and buffered writing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    max_line_length: usize,
    max_literal_size: usize,
    max_command_size: usize,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream with default limits.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_literal_size: DEFAULT_MAX_LITERAL_SIZE,
            max_command_size: DEFAULT_MAX_COMMAND_SIZE,
        }
    }

    /// Sets the line and literal limits.
    #[must_use]
    pub const fn with_limits(mut self, max_line_length: usize, max_literal_size: usize) -> Self {
        self.max_line_length = max_line_length;
        self.max_literal_size = max_literal_size;
        self
    }

    /// Sets the limit on a whole command, lines and literals together.
    #[must_use]
    pub const fn with_max_command_size(mut self, max_command_size: usize) -> Self {
        self.max_command_size = max_command_size;
        self
    }

    /// Reads one complete client command, including any literals.
    ///
    /// Returns `Ok(None)` if the client closed the connection between
    /// commands.
    pub async fn read_command(&mut self) -> Result<Option<Vec<u8>>> {
        let mut command = Vec::new();

        loop {
            let Some(line) = self.read_line().await? else {
                if command.is_empty() {
                    return Ok(None);
                }
                return Err(unexpected_eof());
            };

            command.extend_from_slice(&line);
            if command.len() > self.max_command_size {
                return Err(Error::Protocol("Command too long".to_string()));
            }

            // Check for literal at end of line: {123}
            let Some(literal_len) = parse_literal_length(&line) else {
                break;
            };

            // Refuse before the client sends the data
            let max = self
                .max_literal_size
                .min(self.max_command_size - command.len());
            if literal_len > max {
                return Err(Error::LiteralTooLarge {
                    size: literal_len,
                    max,
                    partial: command,
                });
            }

            self.write_raw(CONTINUATION).await?;

            let start = command.len();
            command.resize(start + literal_len, 0);
            self.reader.read_exact(&mut command[start..]).await?;
            // Continue reading (the command goes on after the literal)
        }

        Ok(Some(command))
    }

    /// Reads a single CRLF-terminated line.
    ///
    /// Returns `Ok(None)` on end of stream before any byte of the line.
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                if line.is_empty() {
                    return Ok(None);
                }
                return Err(unexpected_eof());
            }

            // Take everything up to and including the next LF, if any
            let (len, found_lf) = match buf.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (buf.len(), false),
            };
            line.extend_from_slice(&buf[..len]);
            self.reader.consume(len);

            // A bare LF does not end the line, so check on every chunk
            if line.len() > self.max_line_length {
                return Err(Error::Protocol("Line too long".to_string()));
            }

            // A CR split across reads is picked up with its LF
            if found_lf && line.ends_with(b"\r\n") {
                break;
            }
        }

        Ok(Some(line))
    }

    /// Writes a response to the stream.
    pub async fn write_response(&mut self, response: &Response) -> Result<()> {
        self.write_buffer.clear();
        response.write_to(&mut self.write_buffer);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Writes raw data to the stream (greetings, continuations, BYE).
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost. After STARTTLS that is what
    /// RFC 3501 asks for.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

fn unexpected_eof() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed",
    ))
}

/// Parses a literal length from the end of a line.
///
/// Matches lines ending in `{123}\r\n`.
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;

    // Find the opening brace
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    std::str::from_utf8(digits).ok()?.parse().ok()
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
    use tokio_test::io::Builder;

    use super::*;
    use crate::types::Tag;

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"A1 LOGIN {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"{999999}\r\n"), Some(999_999));
        assert_eq!(parse_literal_length(b"A1 LOGIN {5+}\r\n"), None);
        assert_eq!(parse_literal_length(b"no literal\r\n"), None);
        assert_eq!(parse_literal_length(b"incomplete {123"), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(parse_literal_length(b"empty {}\r\n"), None);
    }

    #[tokio::test]
    async fn test_read_simple_command() {
        let mock = Builder::new().read(b"A1 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);

        let command = framed.read_command().await.unwrap();
        assert_eq!(command.unwrap(), b"A1 NOOP\r\n");
    }

    #[tokio::test]
    async fn test_read_split_line() {
        let mock = Builder::new()
            .read(b"A1 SEL")
            .read(b"ECT INBOX\r")
            .read(b"\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let command = framed.read_command().await.unwrap();
        assert_eq!(command.unwrap(), b"A1 SELECT INBOX\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal() {
        let mock = Builder::new()
            .read(b"A1 LOGIN {5}\r\n")
            .write(CONTINUATION)
            .read(b"fr\r\nd {3}\r\n")
            .write(CONTINUATION)
            .read(b"pwd\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let command = framed.read_command().await.unwrap();
        assert_eq!(command.unwrap(), b"A1 LOGIN {5}\r\nfr\r\nd {3}\r\npwd\r\n");
    }

    #[tokio::test]
    async fn test_clean_eof() {
        let mock = Builder::new().build();
        let mut framed = FramedStream::new(mock);
        assert!(framed.read_command().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_mid_command() {
        let mock = Builder::new().read(b"A1 NOOP").build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(framed.read_command().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let mock = Builder::new().read(b"A9 LOGIN {1001}\r\n").build();
        let mut framed = FramedStream::new(mock).with_limits(1024, 1000);

        match framed.read_command().await {
            Err(Error::LiteralTooLarge { size, max, partial }) => {
                assert_eq!(size, 1001);
                assert_eq!(max, 1000);
                assert_eq!(partial, b"A9 LOGIN {1001}\r\n");
            }
            other => panic!("Expected LiteralTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(200);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock).with_limits(100, 1000);

        let result = framed.read_command().await;
        assert!(result.unwrap_err().to_string().contains("Line too long"));
    }

    #[tokio::test]
    async fn test_bare_line_feeds_are_bounded() {
        let mut builder = Builder::new();
        for _ in 0..11 {
            builder.read(b"xxxxxxxxx\n");
        }
        let mut framed = FramedStream::new(builder.build()).with_limits(100, 1000);

        match framed.read_command().await {
            Err(Error::Protocol(message)) => assert_eq!(message, "Line too long"),
            other => panic!("Expected Protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bare_line_feed_inside_line() {
        let mock = Builder::new().read(b"A1 NO\nOP\r\n").build();
        let mut framed = FramedStream::new(mock);

        let command = framed.read_command().await.unwrap();
        assert_eq!(command.unwrap(), b"A1 NO\nOP\r\n");
    }

    #[tokio::test]
    async fn test_command_size_limit_on_literals() {
        let mut second = vec![b'a'; 900];
        second.extend_from_slice(b" {900}\r\n");
        let mock = Builder::new()
            .read(b"A1 LOGIN {900}\r\n")
            .write(CONTINUATION)
            .read(&second)
            .build();
        let mut framed = FramedStream::new(mock)
            .with_limits(1024, 1000)
            .with_max_command_size(1500);

        match framed.read_command().await {
            Err(Error::LiteralTooLarge { size, max, partial }) => {
                assert_eq!(size, 900);
                assert_eq!(max, 1500 - partial.len());
                assert_eq!(partial.len(), 16 + 900 + 8);
            }
            other => panic!("Expected LiteralTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_command_size_limit_on_lines() {
        let mock = Builder::new()
            .read(b"A1 LOGIN {4}\r\n")
            .write(CONTINUATION)
            .read(b"fred pw and a long tail\r\n")
            .build();
        let mut framed = FramedStream::new(mock).with_max_command_size(30);

        match framed.read_command().await {
            Err(Error::Protocol(message)) => assert_eq!(message, "Command too long"),
            other => panic!("Expected Protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_response() {
        let mock = Builder::new()
            .write(b"* CAPABILITY IMAP4rev1 STARTTLS\r\nA1 OK CAPABILITY completed\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = Response::ok(Tag::new("A1"), "CAPABILITY completed")
            .with_untagged("CAPABILITY IMAP4rev1 STARTTLS");
        framed.write_response(&response).await.unwrap();
    }
}
