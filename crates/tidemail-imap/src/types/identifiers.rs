//! Core IMAP identifiers.

/// IMAP command tag.
///
/// Tags are client-chosen prefixes that identify commands. The server echoes
/// the tag in the tagged completion line of the matching command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Placeholder used when the client tag could not be read.
    pub const UNTAGGED: &'static str = "*";

    /// Creates a new tag from a string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The placeholder tag `*`.
    #[must_use]
    pub fn untagged() -> Self {
        Self(Self::UNTAGGED.to_string())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Tag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
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
    fn new_from_str() {
        let tag = Tag::new("A00001");
        assert_eq!(tag.as_str(), "A00001");
        assert_eq!(Tag::from("A00001"), tag);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Tag::new("CMD123")), "CMD123");
        assert_eq!(Tag::untagged().to_string(), "*");
    }
}
