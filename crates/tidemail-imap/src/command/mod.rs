//! IMAP commands and their execution.
//!
//! The command set is closed: every command the server understands is a
//! variant of [`CommandBody`]. Each variant checks that it is legal in the
//! current session state before it touches the session or the mail store.

mod list;

use crate::protocol::{Response, Session, SessionState};
use crate::types::{Tag, normalize_name};
use crate::{Error, Result};

/// Capabilities advertised by the server.
pub const CAPABILITIES: &str = "IMAP4rev1 STARTTLS";

/// A client command bound to its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Client-chosen tag, echoed in the completion line.
    pub tag: Tag,
    /// What the client asked for.
    pub body: CommandBody,
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandBody {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },

    // Authenticated State Commands
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern, may contain `*` and `%`.
        pattern: String,
    },

    // Selected State Commands
    /// CLOSE command.
    Close,
}

impl CommandBody {
    /// Returns the command name as sent on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::List { .. } => "LIST",
            Self::Close => "CLOSE",
        }
    }
}

impl Command {
    /// Creates a command.
    #[must_use]
    pub fn new(tag: impl Into<String>, body: CommandBody) -> Self {
        Self {
            tag: Tag::new(tag),
            body,
        }
    }

    /// Runs the command against the session.
    ///
    /// Always returns exactly one response carrying this command's tag.
    pub fn execute(&self, session: &mut Session) -> Response {
        let tag = self.tag.clone();
        let name = self.body.name();

        let result = match &self.body {
            CommandBody::Capability => Ok(capability(tag.clone())),
            CommandBody::Noop => Ok(Response::ok(tag.clone(), "NOOP completed")),
            CommandBody::Logout => Ok(logout(tag.clone(), session)),
            CommandBody::StartTls => starttls(tag.clone(), session),
            CommandBody::Login { username, password } => {
                login(tag.clone(), session, username, password)
            }
            CommandBody::Select { mailbox } => select(tag.clone(), session, mailbox, false),
            CommandBody::Examine { mailbox } => select(tag.clone(), session, mailbox, true),
            CommandBody::List { reference, pattern } => {
                list::list(tag.clone(), session, reference, pattern)
            }
            CommandBody::Close => close(tag.clone(), session),
        };

        result.unwrap_or_else(|e| failure(tag, name, &e))
    }
}

/// Turns an execution error into a tagged failure.
fn failure(tag: Tag, name: &str, error: &Error) -> Response {
    match error {
        Error::InvalidState(message) => Response::no(tag, message.clone()),
        Error::Store(e) => {
            tracing::warn!(command = name, error = %e, "mailstore failure");
            Response::no(tag, format!("{name} failed: {e}"))
        }
        other => Response::bad(tag, other.to_string()),
    }
}

/// Fails with a state violation unless `allowed`.
fn require(name: &str, allowed: bool) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::InvalidState(format!("{name} not allowed in this state")))
    }
}

fn capability(tag: Tag) -> Response {
    Response::ok(tag, "CAPABILITY completed").with_untagged(format!("CAPABILITY {CAPABILITIES}"))
}

fn logout(tag: Tag, session: &mut Session) -> Response {
    session.set_state(SessionState::Logout);
    Response::ok(tag, "LOGOUT completed").with_untagged("BYE IMAP4rev1 Server logging out")
}

fn starttls(tag: Tag, session: &mut Session) -> Result<Response> {
    require(
        "STARTTLS",
        matches!(session.state(), SessionState::NotAuthenticated),
    )?;

    if session.is_tls() {
        return Ok(Response::bad(tag, "TLS already active"));
    }
    if !session.starttls_available() {
        return Ok(Response::no(tag, "STARTTLS not available"));
    }

    session.request_tls();
    Ok(Response::ok(tag, "Begin TLS negotiation now"))
}

fn login(tag: Tag, session: &mut Session, username: &str, password: &str) -> Result<Response> {
    require(
        "LOGIN",
        matches!(session.state(), SessionState::NotAuthenticated),
    )?;

    if !session.authenticator().authenticate(username, password)? {
        tracing::info!(username, "login failed");
        return Ok(Response::no(tag, "LOGIN failed"));
    }

    tracing::info!(username, "logged in");
    session.set_state(SessionState::Authenticated);
    Ok(Response::ok(tag, "LOGIN completed"))
}

fn select(tag: Tag, session: &mut Session, mailbox: &str, read_only: bool) -> Result<Response> {
    let name = if read_only { "EXAMINE" } else { "SELECT" };
    require(name, session.state().is_authenticated())?;

    let previous = session.state().clone();
    if !session.select_mailbox(&normalize_name(mailbox), read_only)? {
        return Ok(Response::no(tag, format!("{name} No such mailbox")));
    }

    let code = if read_only { "READ-ONLY" } else { "READ-WRITE" };
    let mut response = Response::ok(tag, format!("[{code}] {name} completed"));
    if let Err(e) = session.add_mailbox_info(&mut response) {
        session.set_state(previous);
        return Err(e);
    }
    Ok(response)
}

fn close(tag: Tag, session: &mut Session) -> Result<Response> {
    require("CLOSE", session.state().is_selected())?;
    session.set_state(SessionState::Authenticated);
    Ok(Response::ok(tag, "CLOSE completed"))
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
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::protocol::Status;
    use crate::protocol::tests::{FixedStore, session, session_with};

    fn login_command(tag: &str) -> Command {
        Command::new(
            tag,
            CommandBody::Login {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
        )
    }

    fn authenticated() -> Session {
        let mut session = session();
        assert!(login_command("A0").execute(&mut session).is_ok());
        session
    }

    fn select_command(tag: &str, mailbox: &str) -> Command {
        Command::new(
            tag,
            CommandBody::Select {
                mailbox: mailbox.to_string(),
            },
        )
    }

    #[test]
    fn test_capability_command() {
        let mut session = session();
        let response = Command::new("A00001", CommandBody::Capability).execute(&mut session);

        assert_eq!(response.tag().as_str(), "A00001");
        assert_eq!(response.message(), "CAPABILITY completed");
        assert_eq!(response.untagged(), ["CAPABILITY IMAP4rev1 STARTTLS"]);
        assert_eq!(response.status(), Status::Ok);
    }

    #[test]
    fn test_logout_command() {
        let mut session = session();
        let response = Command::new("A00004", CommandBody::Logout).execute(&mut session);

        assert_eq!(response.tag().as_str(), "A00004");
        assert_eq!(response.message(), "LOGOUT completed");
        assert_eq!(response.untagged(), ["BYE IMAP4rev1 Server logging out"]);
        assert!(session.is_closed());
    }

    #[test]
    fn test_noop_in_any_state() {
        let mut session = session();
        let response = Command::new("A1", CommandBody::Noop).execute(&mut session);
        assert!(response.is_ok());
        assert_eq!(response.message(), "NOOP completed");
    }

    #[test]
    fn test_login() {
        let mut session = session();
        let response = login_command("A1").execute(&mut session);
        assert_eq!(response.message(), "LOGIN completed");
        assert_eq!(session.state(), &SessionState::Authenticated);

        // A second LOGIN is a state violation
        let response = login_command("A2").execute(&mut session);
        assert_eq!(response.status(), Status::No);
        assert_eq!(response.message(), "LOGIN not allowed in this state");
        assert_eq!(session.state(), &SessionState::Authenticated);
    }

    #[test]
    fn test_login_rejected() {
        let mut session = session();
        let response = Command::new(
            "A1",
            CommandBody::Login {
                username: "user".to_string(),
                password: "wrong".to_string(),
            },
        )
        .execute(&mut session);

        assert_eq!(response.status(), Status::No);
        assert_eq!(response.message(), "LOGIN failed");
        assert_eq!(session.state(), &SessionState::NotAuthenticated);
    }

    #[test]
    fn test_select_requires_authentication() {
        let mut session = session();
        let response = select_command("A1", "inbox").execute(&mut session);

        assert_eq!(response.status(), Status::No);
        assert_eq!(response.message(), "SELECT not allowed in this state");
        assert_eq!(session.state(), &SessionState::NotAuthenticated);
    }

    #[test]
    fn test_select() {
        let mut session = authenticated();
        let response = select_command("A00002", "inbox").execute(&mut session);

        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.message(), "[READ-WRITE] SELECT completed");
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
        assert_eq!(session.selected_mailbox().unwrap().name, "inbox");
        assert!(!session.state().is_read_only());
    }

    #[test]
    fn test_select_unknown_mailbox() {
        let mut session = authenticated();
        let response = select_command("A1", "nothing").execute(&mut session);

        assert_eq!(response.status(), Status::No);
        assert_eq!(response.message(), "SELECT No such mailbox");
        assert!(response.untagged().is_empty());
        assert_eq!(session.state(), &SessionState::Authenticated);
    }

    #[test]
    fn test_select_store_failure_restores_state() {
        let store = Arc::new(FixedStore::default());
        let mut session = session_with(store.clone());
        login_command("A0").execute(&mut session);
        store.fail_next_uid.store(true, Ordering::Relaxed);

        let response = select_command("A1", "inbox").execute(&mut session);

        assert_eq!(response.status(), Status::No);
        assert!(response.message().starts_with("SELECT failed"));
        assert!(response.untagged().is_empty());
        assert_eq!(session.state(), &SessionState::Authenticated);
    }

    #[test]
    fn test_examine_is_read_only() {
        let mut session = authenticated();
        let response = Command::new(
            "A1",
            CommandBody::Examine {
                mailbox: "inbox".to_string(),
            },
        )
        .execute(&mut session);

        assert_eq!(response.message(), "[READ-ONLY] EXAMINE completed");
        assert_eq!(response.untagged().len(), 5);
        assert!(session.state().is_read_only());
    }

    #[test]
    fn test_close() {
        let mut session = authenticated();
        let response = Command::new("A1", CommandBody::Close).execute(&mut session);
        assert_eq!(response.status(), Status::No);

        select_command("A2", "inbox").execute(&mut session);
        let response = Command::new("A3", CommandBody::Close).execute(&mut session);
        assert_eq!(response.message(), "CLOSE completed");
        assert_eq!(session.state(), &SessionState::Authenticated);
        assert!(session.selected_mailbox().is_none());
    }

    #[test]
    fn test_starttls_unavailable() {
        let mut session = session();
        let response = Command::new("A1", CommandBody::StartTls).execute(&mut session);
        assert_eq!(response.status(), Status::No);
        assert_eq!(response.message(), "STARTTLS not available");
        assert!(!session.take_tls_request());
    }

    #[test]
    fn test_starttls() {
        let mut session = session().with_starttls(true);
        let response = Command::new("A1", CommandBody::StartTls).execute(&mut session);
        assert_eq!(response.message(), "Begin TLS negotiation now");
        assert!(session.take_tls_request());

        session.set_tls_active();
        let response = Command::new("A2", CommandBody::StartTls).execute(&mut session);
        assert_eq!(response.status(), Status::Bad);
        assert_eq!(response.message(), "TLS already active");
    }

    #[test]
    fn test_starttls_after_login() {
        let mut session = authenticated().with_starttls(true);
        let response = Command::new("A1", CommandBody::StartTls).execute(&mut session);
        assert_eq!(response.status(), Status::No);
        assert!(!session.take_tls_request());
    }
}
