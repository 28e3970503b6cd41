//! Session state types.
//!
//! This module defines the states an IMAP session can be in, following
//! RFC 3501 section 3.

use crate::types::Mailbox;

/// Session state as defined by RFC 3501.
///
/// The IMAP protocol has four states:
/// - `NotAuthenticated`: Initial state, only authentication commands allowed
/// - `Authenticated`: User is authenticated, can select mailboxes
/// - `Selected`: A mailbox is selected, can manipulate messages
/// - `Logout`: Connection is being closed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not authenticated - waiting for credentials.
    ///
    /// In this state, only these commands are valid:
    /// - CAPABILITY
    /// - NOOP
    /// - LOGOUT
    /// - STARTTLS
    /// - LOGIN
    #[default]
    NotAuthenticated,

    /// Authenticated - user has logged in.
    ///
    /// In this state, these additional commands are valid:
    /// - SELECT
    /// - EXAMINE
    /// - LIST
    Authenticated,

    /// Selected - a mailbox is currently open.
    ///
    /// In this state, all authenticated commands are valid plus:
    /// - CLOSE
    Selected(SelectedState),

    /// Logout - connection is being closed.
    ///
    /// Terminal. No command is dispatched once the session gets here.
    Logout,
}

impl SessionState {
    /// Returns `true` if the client is authenticated (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns `true` if a mailbox is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// Returns the selected mailbox, if any.
    #[must_use]
    pub const fn selected_mailbox(&self) -> Option<&Mailbox> {
        match self {
            Self::Selected(state) => Some(&state.mailbox),
            _ => None,
        }
    }

    /// Returns `true` if the selected mailbox is read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        match self {
            Self::Selected(state) => state.read_only,
            _ => false,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not-authenticated",
            Self::Authenticated => "authenticated",
            Self::Selected(_) => "selected",
            Self::Logout => "logout",
        }
    }
}

/// State information when a mailbox is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Snapshot of the selected mailbox.
    pub mailbox: Mailbox,
    /// Whether the mailbox is read-only (EXAMINE vs SELECT).
    pub read_only: bool,
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

    fn selected(read_only: bool) -> SessionState {
        SessionState::Selected(SelectedState {
            mailbox: Mailbox::new(1, vec!["INBOX".to_string()]),
            read_only,
        })
    }

    #[test]
    fn test_session_state_default() {
        assert_eq!(SessionState::default(), SessionState::NotAuthenticated);
    }

    #[test]
    fn test_is_authenticated() {
        assert!(!SessionState::NotAuthenticated.is_authenticated());
        assert!(SessionState::Authenticated.is_authenticated());
        assert!(selected(false).is_authenticated());
        assert!(!SessionState::Logout.is_authenticated());
    }

    #[test]
    fn test_is_selected() {
        assert!(!SessionState::NotAuthenticated.is_selected());
        assert!(!SessionState::Authenticated.is_selected());
        assert!(selected(false).is_selected());
    }

    #[test]
    fn test_selected_mailbox() {
        assert_eq!(SessionState::Authenticated.selected_mailbox(), None);
        assert_eq!(selected(true).selected_mailbox().unwrap().name, "INBOX");
    }

    #[test]
    fn test_is_read_only() {
        assert!(!SessionState::Authenticated.is_read_only());
        assert!(!selected(false).is_read_only());
        assert!(selected(true).is_read_only());
    }
}
