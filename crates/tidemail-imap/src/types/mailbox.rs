//! Mailbox types.

/// Hierarchy delimiter used in mailbox names.
pub const DELIMITER: char = '/';

/// A mailbox as reported by the mail store.
///
/// Sessions hold a snapshot of this value while the mailbox is selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox {
    /// The last component of the mailbox name.
    pub name: String,
    /// Store identifier, also used as UIDVALIDITY.
    pub id: u32,
    /// Full hierarchical path, root first.
    pub path: Vec<String>,
}

impl Mailbox {
    /// Creates a mailbox from its path; the name is the last component.
    #[must_use]
    pub fn new(id: u32, path: Vec<String>) -> Self {
        let name = path.last().cloned().unwrap_or_default();
        Self { name, id, path }
    }

    /// Returns the delimiter-joined full name.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.path.join(&DELIMITER.to_string())
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Normalizes a client-supplied mailbox name.
///
/// `INBOX` is case-insensitive; every other name is kept as sent.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    if name.eq_ignore_ascii_case("INBOX") {
        "INBOX".to_string()
    } else {
        name.to_string()
    }
}

/// Splits a mailbox name into path components.
#[must_use]
pub fn split_path(name: &str) -> Vec<String> {
    name.split(DELIMITER)
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Mailbox attributes sent in LIST responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// Mailbox cannot be selected.
    NoSelect,
    /// Mailbox has children.
    HasChildren,
    /// Mailbox has no children.
    HasNoChildren,
}

impl MailboxAttribute {
    /// Returns the wire form of the attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSelect => "\\Noselect",
            Self::HasChildren => "\\HasChildren",
            Self::HasNoChildren => "\\HasNoChildren",
        }
    }
}

impl std::fmt::Display for MailboxAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
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
    fn new_takes_name_from_path() {
        let mailbox = Mailbox::new(3, vec!["inbox".to_string(), "starred".to_string()]);
        assert_eq!(mailbox.name, "starred");
        assert_eq!(mailbox.full_name(), "inbox/starred");
        assert_eq!(mailbox.to_string(), "inbox/starred");
    }

    #[test]
    fn inbox_is_case_insensitive() {
        assert_eq!(normalize_name("inbox"), "INBOX");
        assert_eq!(normalize_name("InBox"), "INBOX");
        assert_eq!(normalize_name("inbox/sub"), "inbox/sub");
        assert_eq!(normalize_name("Sent"), "Sent");
    }

    #[test]
    fn split_ignores_empty_components() {
        assert_eq!(split_path("a/b"), vec!["a", "b"]);
        assert_eq!(split_path("/a//b/"), vec!["a", "b"]);
        assert!(split_path("").is_empty());
    }

    #[test]
    fn attribute_wire_form() {
        assert_eq!(MailboxAttribute::NoSelect.to_string(), "\\Noselect");
        assert_eq!(MailboxAttribute::HasChildren.as_str(), "\\HasChildren");
    }
}
