//! Charsets for unquoted strings.
//!
//! Each grammar position that accepts an unquoted string has its own set of
//! bytes that end the scan. The sets are static and never change at runtime.

/// Bytes that are not part of an `astring-char`.
const ASTRING_EXCEPTIONS: &[u8] = b" ()]%*\\{";

/// Bytes that are not part of a tag.
const TAG_EXCEPTIONS: &[u8] = b" ()]%*\\{+";

/// Bytes that are not part of a `list-char`.
///
/// `%` and `*` are the LIST wildcards, so they stay in the token.
const LIST_MAILBOX_EXCEPTIONS: &[u8] = b" ()]\\{";

/// How the lexer scans an unquoted string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexMode {
    /// Mailbox names, user names and other `astring` arguments.
    #[default]
    Astring,
    /// Command tags.
    Tag,
    /// LIST patterns, which may contain wildcards.
    ListMailbox,
    /// Any printable run without spaces.
    Any,
}

impl LexMode {
    /// Returns the bytes that terminate an unquoted scan in this mode.
    #[must_use]
    pub const fn exceptions(self) -> &'static [u8] {
        match self {
            Self::Astring => ASTRING_EXCEPTIONS,
            Self::Tag => TAG_EXCEPTIONS,
            Self::ListMailbox => LIST_MAILBOX_EXCEPTIONS,
            Self::Any => &[],
        }
    }

    /// Grammar name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Astring => "ASTRING",
            Self::Tag => "TAG",
            Self::ListMailbox => "LIST-MAILBOX",
            Self::Any => "ANY",
        }
    }

    /// Returns true if `byte` may appear in an unquoted string in this mode.
    #[must_use]
    pub fn accepts(self, byte: u8) -> bool {
        byte > b' ' && byte < 0x7f && !self.exceptions().contains(&byte)
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
    fn test_tag_rejects_plus() {
        assert!(LexMode::Astring.accepts(b'+'));
        assert!(!LexMode::Tag.accepts(b'+'));
    }

    #[test]
    fn test_list_mailbox_keeps_wildcards() {
        assert!(LexMode::ListMailbox.accepts(b'%'));
        assert!(LexMode::ListMailbox.accepts(b'*'));
        assert!(!LexMode::Astring.accepts(b'%'));
        assert!(!LexMode::Astring.accepts(b'*'));
        assert!(!LexMode::ListMailbox.accepts(b'('));
    }

    #[test]
    fn test_any_accepts_specials() {
        for byte in b"()]%*\\{+" {
            assert!(LexMode::Any.accepts(*byte));
        }
    }

    #[test]
    fn test_controls_never_accepted() {
        for mode in [LexMode::Astring, LexMode::Tag, LexMode::ListMailbox, LexMode::Any] {
            assert!(!mode.accepts(b' '));
            assert!(!mode.accepts(b'\r'));
            assert!(!mode.accepts(b'\n'));
            assert!(!mode.accepts(0x00));
            assert!(!mode.accepts(0x7f));
            assert!(!mode.accepts(0xc3));
        }
    }
}
