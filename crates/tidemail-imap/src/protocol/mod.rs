//! Per-connection IMAP session.
//!
//! The session is a pure state machine: it receives one framed command at a
//! time via [`Session::handle`] and returns the [`Response`] to write back. It
//! performs no I/O of its own, which keeps it testable without sockets.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tidemail_imap::mailstore::MemoryStore;
//! use tidemail_imap::protocol::Session;
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut session = Session::new(1, store.clone(), store);
//!
//! let response = session.handle(b"A00001 CAPABILITY\r\n");
//! assert_eq!(response.message(), "CAPABILITY completed");
//! assert_eq!(response.untagged(), ["CAPABILITY IMAP4rev1 STARTTLS"]);
//! ```

// Allow missing_const_for_fn since many functions can't be const in stable Rust.
#![allow(clippy::missing_const_for_fn)]

mod response;
mod state;

use std::sync::Arc;

pub use response::{Response, Status};
pub use state::{SelectedState, SessionState};

use crate::command::Command;
use crate::mailstore::{Authenticator, Mailstore};
use crate::parser::CommandParser;
use crate::types::{Mailbox, Tag};
use crate::{Error, Result};

/// State of one client connection.
pub struct Session {
    /// Connection id, used in logs.
    id: u64,
    /// Current protocol state.
    state: SessionState,
    /// Mailbox metadata.
    store: Arc<dyn Mailstore>,
    /// Credential check for LOGIN.
    authenticator: Arc<dyn Authenticator>,
    /// Whether the server can upgrade this connection.
    starttls_available: bool,
    /// Whether the connection is already encrypted.
    tls_active: bool,
    /// Set by STARTTLS, taken by the transport.
    tls_requested: bool,
    /// Span every command of this session is logged under.
    span: tracing::Span,
}

impl Session {
    /// Creates a session in the not-authenticated state.
    #[must_use]
    pub fn new(id: u64, store: Arc<dyn Mailstore>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            id,
            state: SessionState::NotAuthenticated,
            store,
            authenticator,
            starttls_available: false,
            tls_active: false,
            tls_requested: false,
            span: tracing::info_span!("session", id),
        }
    }

    /// Sets whether STARTTLS can be offered on this connection.
    #[must_use]
    pub fn with_starttls(mut self, available: bool) -> Self {
        self.starttls_available = available;
        self
    }

    /// Replaces the span used for logging.
    #[must_use]
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns the selected mailbox, if any.
    #[must_use]
    pub const fn selected_mailbox(&self) -> Option<&Mailbox> {
        self.state.selected_mailbox()
    }

    /// Returns true once LOGOUT has been processed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Logout)
    }

    /// Returns true if STARTTLS can be offered.
    #[must_use]
    pub const fn starttls_available(&self) -> bool {
        self.starttls_available
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls_active
    }

    /// Records that the transport finished the TLS handshake.
    pub fn set_tls_active(&mut self) {
        self.tls_active = true;
    }

    /// Returns and clears the pending STARTTLS request.
    pub fn take_tls_request(&mut self) -> bool {
        std::mem::replace(&mut self.tls_requested, false)
    }

    pub(crate) fn request_tls(&mut self) {
        self.tls_requested = true;
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        tracing::debug!(parent: &self.span, from = self.state.name(), to = state.name(), "state change");
        self.state = state;
    }

    pub(crate) fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn Mailstore {
        self.store.as_ref()
    }

    /// Parses and executes one framed command.
    ///
    /// Parse errors never escape: they become a `BAD` response carrying the
    /// client tag, or `*` if the tag itself could not be read.
    pub fn handle(&mut self, input: &[u8]) -> Response {
        let span = self.span.clone();
        let _entered = span.enter();

        let mut parser = CommandParser::new(input);
        let command: Command = match parser.parse() {
            Ok(command) => command,
            Err(e) => {
                let tag = parser.tag().cloned().unwrap_or_else(Tag::untagged);
                tracing::warn!(%tag, error = %e, "rejected command");
                return Response::bad(tag, e.to_string());
            }
        };

        if self.is_closed() {
            return Response::bad(command.tag, "Session is logging out");
        }

        tracing::debug!(tag = %command.tag, command = command.body.name(), "executing");
        command.execute(self)
    }

    /// Selects a mailbox by name.
    ///
    /// Returns `Ok(false)` and leaves the session untouched if the mailbox
    /// does not exist. On success the session moves to the selected state.
    pub fn select_mailbox(&mut self, name: &str, read_only: bool) -> Result<bool> {
        let Some(mailbox) = self.store.get_mailbox(name)? else {
            return Ok(false);
        };

        tracing::debug!(parent: &self.span, mailbox = %mailbox, read_only, "selected mailbox");
        self.set_state(SessionState::Selected(SelectedState { mailbox, read_only }));
        Ok(true)
    }

    /// Appends the five SELECT status lines for the selected mailbox.
    ///
    /// All counters are read before anything is appended, so a store failure
    /// leaves the response unchanged.
    pub fn add_mailbox_info(&self, response: &mut Response) -> Result<()> {
        let mailbox = self
            .selected_mailbox()
            .ok_or_else(|| Error::InvalidState("no mailbox selected".to_string()))?;

        let first_unseen = self.store.first_unseen(mailbox.id)?;
        let total = self.store.total_messages(mailbox.id)?;
        let recent = self.store.recent_messages(mailbox.id)?;
        let next_uid = self.store.next_uid(mailbox.id)?;

        response.extra(format!("{total} EXISTS"));
        response.extra(format!("{recent} RECENT"));
        response.extra(format!(
            "OK [UNSEEN {first_unseen}] Message {first_unseen} is first unseen"
        ));
        response.extra(format!("OK [UIDVALIDITY {}] UIDs valid", mailbox.id));
        response.extra(format!("OK [UIDNEXT {next_uid}] Predicted next UID"));
        Ok(())
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
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::mailstore::StoreError;

    /// Store with fixed answers; only `inbox` exists.
    #[derive(Default)]
    pub(crate) struct FixedStore {
        pub(crate) fail_next_uid: AtomicBool,
        pub(crate) fail_lookup: AtomicBool,
        pub(crate) mailbox_queries: AtomicUsize,
    }

    impl Mailstore for FixedStore {
        fn get_mailbox(&self, name: &str) -> std::result::Result<Option<Mailbox>, StoreError> {
            if self.fail_lookup.load(Ordering::Relaxed) {
                return Err(StoreError::Unavailable("offline".to_string()));
            }
            Ok(name
                .eq_ignore_ascii_case("inbox")
                .then(|| Mailbox::new(1, vec!["inbox".to_string()])))
        }

        fn get_mailboxes(&self, path: &[String]) -> std::result::Result<Vec<Mailbox>, StoreError> {
            self.mailbox_queries.fetch_add(1, Ordering::Relaxed);
            Ok(match path {
                [] => vec![
                    Mailbox::new(1, vec!["inbox".to_string()]),
                    Mailbox::new(2, vec!["spam".to_string()]),
                ],
                [root] if root == "inbox" => {
                    vec![Mailbox::new(3, vec!["inbox".to_string(), "starred".to_string()])]
                }
                _ => Vec::new(),
            })
        }

        fn first_unseen(&self, _mailbox: u32) -> std::result::Result<u32, StoreError> {
            Ok(4)
        }

        fn total_messages(&self, _mailbox: u32) -> std::result::Result<u32, StoreError> {
            Ok(8)
        }

        fn recent_messages(&self, _mailbox: u32) -> std::result::Result<u32, StoreError> {
            Ok(4)
        }

        fn next_uid(&self, _mailbox: u32) -> std::result::Result<u32, StoreError> {
            if self.fail_next_uid.load(Ordering::Relaxed) {
                return Err(StoreError::Unavailable("offline".to_string()));
            }
            Ok(9)
        }
    }

    impl Authenticator for FixedStore {
        fn authenticate(
            &self,
            username: &str,
            password: &str,
        ) -> std::result::Result<bool, StoreError> {
            Ok(username == "user" && password == "pass")
        }
    }

    pub(crate) fn session_with(store: Arc<FixedStore>) -> Session {
        Session::new(1, store.clone(), store)
    }

    pub(crate) fn session() -> Session {
        session_with(Arc::new(FixedStore::default()))
    }

    #[test]
    fn test_new_session() {
        let session = session();
        assert_eq!(session.id(), 1);
        assert_eq!(session.state(), &SessionState::NotAuthenticated);
        assert!(session.selected_mailbox().is_none());
        assert!(!session.is_tls());
    }

    #[test]
    fn test_select_unknown_mailbox() {
        let mut session = session();
        session.set_state(SessionState::Authenticated);

        assert!(!session.select_mailbox("nothing", false).unwrap());
        assert_eq!(session.state(), &SessionState::Authenticated);
        assert!(session.selected_mailbox().is_none());
    }

    #[test]
    fn test_select_known_mailbox() {
        let mut session = session();
        session.set_state(SessionState::Authenticated);

        assert!(session.select_mailbox("inbox", false).unwrap());
        assert!(session.state().is_selected());
        let mailbox = session.selected_mailbox().unwrap();
        assert_eq!(mailbox.name, "inbox");
        assert_eq!(mailbox.id, 1);
    }

    #[test]
    fn test_select_store_error() {
        let store = Arc::new(FixedStore::default());
        store.fail_lookup.store(true, Ordering::Relaxed);
        let mut session = session_with(store);
        session.set_state(SessionState::Authenticated);

        assert!(matches!(
            session.select_mailbox("inbox", false),
            Err(Error::Store(_))
        ));
        assert_eq!(session.state(), &SessionState::Authenticated);
    }

    #[test]
    fn test_add_mailbox_info() {
        let mut session = session();
        session.select_mailbox("inbox", false).unwrap();

        let mut response = Response::ok(Tag::new("A00002"), "SELECT completed");
        session.add_mailbox_info(&mut response).unwrap();

        assert_eq!(
            response.untagged(),
            [
                "8 EXISTS",
                "4 RECENT",
                "OK [UNSEEN 4] Message 4 is first unseen",
                "OK [UIDVALIDITY 1] UIDs valid",
                "OK [UIDNEXT 9] Predicted next UID",
            ]
        );
    }

    #[test]
    fn test_add_mailbox_info_is_all_or_nothing() {
        let store = Arc::new(FixedStore::default());
        store.fail_next_uid.store(true, Ordering::Relaxed);
        let mut session = session_with(store);
        session.select_mailbox("inbox", false).unwrap();

        let mut response = Response::ok(Tag::new("A00002"), "SELECT completed");
        assert!(session.add_mailbox_info(&mut response).is_err());
        assert!(response.untagged().is_empty());
    }

    #[test]
    fn test_add_mailbox_info_requires_selection() {
        let session = session();
        let mut response = Response::ok(Tag::new("A1"), "x");
        assert!(matches!(
            session.add_mailbox_info(&mut response),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_handle_bad_tag() {
        let mut session = session();
        let response = session.handle(b"+bad CAPABILITY\r\n");
        assert_eq!(response.tag().as_str(), "*");
        assert_eq!(response.status(), Status::Bad);
        assert!(response.message().contains("Expected TAG"));
    }

    #[test]
    fn test_handle_bad_arguments_keeps_tag() {
        let mut session = session();
        let response = session.handle(b"A7 LOGIN \"user\r\n");
        assert_eq!(response.tag().as_str(), "A7");
        assert_eq!(response.status(), Status::Bad);

        // The session keeps working after a parse failure
        let response = session.handle(b"A8 NOOP\r\n");
        assert_eq!(response.tag().as_str(), "A8");
        assert!(response.is_ok());
    }

    #[test]
    fn test_handle_after_logout() {
        let mut session = session();
        assert!(session.handle(b"A1 LOGOUT\r\n").is_ok());
        assert!(session.is_closed());

        let response = session.handle(b"A2 CAPABILITY\r\n");
        assert_eq!(response.status(), Status::Bad);
        assert!(response.untagged().is_empty());
    }

    #[test]
    fn test_tls_request_is_taken_once() {
        let mut session = session();
        session.request_tls();
        assert!(session.take_tls_request());
        assert!(!session.take_tls_request());
    }
}
