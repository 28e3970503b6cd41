//! Storage interfaces consumed by the session.
//!
//! The engine never stores mail itself. It asks a [`Mailstore`] for mailbox
//! metadata and an [`Authenticator`] for credential checks. Both are shared by
//! every session of a server, so implementations must be `Send + Sync` and do
//! their own synchronization.
//!
//! [`MemoryStore`] implements both traits in memory for tests and the demo
//! binary.

mod memory;

use thiserror::Error;

pub use memory::MemoryStore;

use crate::types::Mailbox;

/// Errors reported by a mail store or authenticator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No mailbox has the given id.
    #[error("no mailbox with id {0}")]
    NoSuchMailbox(u32),

    /// A mailbox with this name already exists.
    #[error("mailbox already exists: {0}")]
    AlreadyExists(String),

    /// The store cannot serve requests right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A counter (mailbox id, UID) has no values left.
    #[error("{0} exhausted")]
    Exhausted(String),

    /// Error from a storage backend.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Mailbox lookups and per-mailbox counters.
///
/// All calls are synchronous. The session issues the four counter queries of a
/// SELECT back to back; if they must be consistent with each other, that is up
/// to the implementation.
pub trait Mailstore: Send + Sync {
    /// Looks up a mailbox by its full name.
    ///
    /// Returns `Ok(None)` if the mailbox does not exist.
    fn get_mailbox(&self, name: &str) -> Result<Option<Mailbox>, StoreError>;

    /// Lists the direct children of `path`; an empty path lists the root.
    fn get_mailboxes(&self, path: &[String]) -> Result<Vec<Mailbox>, StoreError>;

    /// Sequence number of the first unseen message, or 0 if every message
    /// has been seen.
    fn first_unseen(&self, mailbox: u32) -> Result<u32, StoreError>;

    /// Total number of messages in the mailbox.
    fn total_messages(&self, mailbox: u32) -> Result<u32, StoreError>;

    /// Number of recent (unseen) messages in the mailbox.
    fn recent_messages(&self, mailbox: u32) -> Result<u32, StoreError>;

    /// The UID the next delivered message will get.
    fn next_uid(&self, mailbox: u32) -> Result<u32, StoreError>;
}

/// Credential check used by LOGIN.
pub trait Authenticator: Send + Sync {
    /// Returns `Ok(true)` if the credentials are valid.
    fn authenticate(&self, username: &str, password: &str) -> Result<bool, StoreError>;
}
