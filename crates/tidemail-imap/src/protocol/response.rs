//! Server responses.

use bytes::{BufMut, BytesMut};

use crate::types::Tag;

/// Status of a tagged completion line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed.
    No,
    /// Command was malformed or not understood.
    Bad,
}

impl Status {
    /// Returns the wire form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response to a single command.
///
/// Zero or more untagged lines, in order, followed by one tagged completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    tag: Tag,
    status: Status,
    message: String,
    untagged: Vec<String>,
}

impl Response {
    /// Creates a response with the given completion.
    #[must_use]
    pub fn new(tag: Tag, status: Status, message: impl Into<String>) -> Self {
        Self {
            tag,
            status,
            message: message.into(),
            untagged: Vec::new(),
        }
    }

    /// Creates an `OK` response.
    #[must_use]
    pub fn ok(tag: Tag, message: impl Into<String>) -> Self {
        Self::new(tag, Status::Ok, message)
    }

    /// Creates a `NO` response.
    #[must_use]
    pub fn no(tag: Tag, message: impl Into<String>) -> Self {
        Self::new(tag, Status::No, message)
    }

    /// Creates a `BAD` response.
    #[must_use]
    pub fn bad(tag: Tag, message: impl Into<String>) -> Self {
        Self::new(tag, Status::Bad, message)
    }

    /// Appends an untagged line.
    pub fn extra(&mut self, line: impl Into<String>) {
        self.untagged.push(line.into());
    }

    /// Appends an untagged line, builder style.
    #[must_use]
    pub fn with_untagged(mut self, line: impl Into<String>) -> Self {
        self.extra(line);
        self
    }

    /// Returns the tag.
    #[must_use]
    pub const fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Returns the completion status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Returns the completion message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the untagged lines, in order.
    #[must_use]
    pub fn untagged(&self) -> &[String] {
        &self.untagged
    }

    /// Returns true if the command succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok)
    }

    /// Serializes the response into `buf`, CRLF after every line.
    pub fn write_to(&self, buf: &mut BytesMut) {
        for line in &self.untagged {
            buf.put_slice(b"* ");
            buf.put_slice(line.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(self.tag.as_str().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(self.status.as_str().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(self.message.as_bytes());
        buf.put_slice(b"\r\n");
    }

    /// Serializes the response into a new buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(64);
        self.write_to(&mut buf);
        buf.to_vec()
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
    fn test_tagged_only() {
        let response = Response::ok(Tag::new("A1"), "NOOP completed");
        assert_eq!(response.to_bytes(), b"A1 OK NOOP completed\r\n");
        assert!(response.is_ok());
        assert!(response.untagged().is_empty());
    }

    #[test]
    fn test_untagged_order() {
        let mut response = Response::ok(Tag::new("A2"), "SELECT completed");
        response.extra("8 EXISTS");
        response.extra("4 RECENT");

        assert_eq!(
            response.to_bytes(),
            b"* 8 EXISTS\r\n* 4 RECENT\r\nA2 OK SELECT completed\r\n"
        );
    }

    #[test]
    fn test_failure_statuses() {
        let no = Response::no(Tag::new("A3"), "LOGIN failed");
        assert_eq!(no.status(), Status::No);
        assert!(!no.is_ok());
        assert_eq!(no.to_bytes(), b"A3 NO LOGIN failed\r\n");

        let bad = Response::bad(Tag::untagged(), "Expected TAG");
        assert_eq!(bad.to_bytes(), b"* BAD Expected TAG\r\n");
    }
}
