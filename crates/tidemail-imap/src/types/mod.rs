//! Core IMAP types shared by the parser, the session and the mail store.

mod identifiers;
mod mailbox;

pub use identifiers::Tag;
pub use mailbox::{DELIMITER, Mailbox, MailboxAttribute, normalize_name, split_path};
