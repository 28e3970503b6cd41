//! IMAP token types.

/// Kinds of token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Atom, quoted string or literal.
    String,
    /// CRLF line ending.
    Eol,
    /// Produced once the input is exhausted.
    Invalid,
}

/// A token produced by the lexer.
///
/// The value is raw bytes because literals are binary safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    value: Vec<u8>,
    kind: TokenKind,
}

impl Token {
    /// Creates a string token.
    #[must_use]
    pub const fn string(value: Vec<u8>) -> Self {
        Self {
            value,
            kind: TokenKind::String,
        }
    }

    /// Creates an end-of-line token.
    #[must_use]
    pub const fn eol() -> Self {
        Self {
            value: Vec::new(),
            kind: TokenKind::Eol,
        }
    }

    /// Creates the token returned at end of input.
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            value: Vec::new(),
            kind: TokenKind::Invalid,
        }
    }

    /// Returns the token kind.
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Returns the token value.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consumes the token and returns its value.
    #[must_use]
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }
}
