//! LIST command: walks the mailbox hierarchy and matches wildcards.

use super::require;
use crate::Result;
use crate::mailstore::Mailstore;
use crate::protocol::{Response, Session};
use crate::types::{DELIMITER, Mailbox, MailboxAttribute, Tag};

pub(super) fn list(
    tag: Tag,
    session: &Session,
    reference: &str,
    pattern: &str,
) -> Result<Response> {
    require("LIST", session.state().is_authenticated())?;

    let mut response = Response::ok(tag, "LIST completed");

    // An empty pattern asks for the hierarchy delimiter only
    if pattern.is_empty() {
        response.extra(format!(
            "LIST ({}) \"{DELIMITER}\" \"\"",
            MailboxAttribute::NoSelect
        ));
        return Ok(response);
    }

    let full_pattern = format!("{reference}{pattern}");
    let store = session.store();
    let mut lines = Vec::new();
    walk(store, store.get_mailboxes(&[])?, full_pattern.as_bytes(), &mut lines)?;

    for line in lines {
        response.extra(line);
    }
    Ok(response)
}

/// Visits `mailboxes` and their descendants depth first, collecting matching
/// LIST lines. Each level is fetched from the store once.
fn walk(
    store: &dyn Mailstore,
    mailboxes: Vec<Mailbox>,
    pattern: &[u8],
    lines: &mut Vec<String>,
) -> Result<()> {
    for mailbox in mailboxes {
        let children = store.get_mailboxes(&mailbox.path)?;
        if matches(pattern, mailbox.full_name().as_bytes()) {
            lines.push(list_line(&mailbox, !children.is_empty()));
        }
        if !children.is_empty() {
            walk(store, children, pattern, lines)?;
        }
    }
    Ok(())
}

fn list_line(mailbox: &Mailbox, has_children: bool) -> String {
    let attribute = if has_children {
        MailboxAttribute::HasChildren
    } else {
        MailboxAttribute::HasNoChildren
    };
    format!(
        "LIST ({attribute}) \"{DELIMITER}\" {}",
        quote(&mailbox.full_name())
    )
}

/// Quotes a mailbox name, escaping `"` and `\`.
fn quote(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Matches a LIST pattern: `*` matches anything, `%` anything but the
/// hierarchy delimiter.
///
/// A leading `INBOX` component of the name compares case-insensitively.
/// Runs in `O(pattern.len() * name.len())`.
fn matches(pattern: &[u8], name: &[u8]) -> bool {
    let folded = inbox_prefix_len(name);

    // reachable[j]: the pattern consumed so far matches name[..j]
    let mut reachable = vec![false; name.len() + 1];
    reachable[0] = true;

    for &p in pattern {
        let mut next = vec![false; name.len() + 1];
        match p {
            b'*' => {
                let mut any = false;
                for (n, &r) in next.iter_mut().zip(&reachable) {
                    any |= r;
                    *n = any;
                }
            }
            b'%' => {
                let mut any = false;
                for (j, (n, &r)) in next.iter_mut().zip(&reachable).enumerate() {
                    if j > 0 && name[j - 1] == DELIMITER as u8 {
                        any = false;
                    }
                    any |= r;
                    *n = any;
                }
            }
            byte => {
                for (j, &c) in name.iter().enumerate() {
                    let same = c == byte || (j < folded && c.eq_ignore_ascii_case(&byte));
                    next[j + 1] = reachable[j] && same;
                }
            }
        }
        if !next.iter().any(|&r| r) {
            return false;
        }
        reachable = next;
    }

    reachable[name.len()]
}

/// Length of a leading `INBOX` component in any case, or 0.
fn inbox_prefix_len(name: &[u8]) -> usize {
    const INBOX: &[u8] = b"INBOX";
    let head = name
        .split(|&b| b == DELIMITER as u8)
        .next()
        .unwrap_or_default();
    if head.eq_ignore_ascii_case(INBOX) {
        INBOX.len()
    } else {
        0
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
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::command::{Command, CommandBody};
    use crate::protocol::Status;
    use crate::protocol::tests::{FixedStore, session, session_with};

    fn run(reference: &str, pattern: &str) -> Response {
        let mut session = session();
        session.handle(b"A0 LOGIN user pass\r\n");
        Command::new(
            "A1",
            CommandBody::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            },
        )
        .execute(&mut session)
    }

    #[test]
    fn test_wildcards() {
        assert!(matches(b"*", b"inbox/starred"));
        assert!(matches(b"%", b"inbox"));
        assert!(!matches(b"%", b"inbox/starred"));
        assert!(matches(b"inbox/%", b"inbox/starred"));
        assert!(matches(b"in*red", b"inbox/starred"));
        assert!(!matches(b"in%red", b"inbox/starred"));
        assert!(matches(b"spam", b"spam"));
        assert!(!matches(b"spam", b"spam2"));
        assert!(matches(b"", b""));
        assert!(!matches(b"", b"inbox"));
        assert!(matches(b"**", b""));
        assert!(matches(b"%/%", b"inbox/starred"));
        assert!(!matches(b"%/%", b"inbox/starred/old"));
    }

    #[test]
    fn test_many_wildcards_stay_fast() {
        let name = [b'a'; 30];
        let stars = b"*".repeat(24);
        assert!(!matches(&[stars.as_slice(), b"z"].concat(), &name));
        assert!(matches(&[stars.as_slice(), b"a"].concat(), &name));

        let percents = b"%".repeat(24);
        assert!(!matches(&[percents.as_slice(), b"z"].concat(), &name));
        assert!(matches(&[percents.as_slice(), b"a"].concat(), &name));

        let mixed = b"*%".repeat(12);
        let mut nested = b"a/".repeat(14);
        nested.extend_from_slice(b"ab");
        assert!(!matches(&[mixed.as_slice(), b"z"].concat(), &nested));
        assert!(matches(&[mixed.as_slice(), b"b"].concat(), &nested));
    }

    #[test]
    fn test_inbox_is_case_insensitive() {
        assert!(matches(b"INBOX", b"inbox"));
        assert!(matches(b"inbox", b"INBOX"));
        assert!(matches(b"InBox/%", b"INBOX/starred"));
        assert!(matches(b"in*", b"INBOX"));
        assert!(!matches(b"INBOX/STARRED", b"inbox/starred"));
        assert!(!matches(b"SPAM", b"spam"));
        assert!(!matches(b"inboxes", b"INBOXES"));

        for pattern in ["inbox", "INBOX", "Inbox"] {
            assert_eq!(
                run("", pattern).untagged(),
                ["LIST (\\HasChildren) \"/\" \"inbox\""]
            );
        }
        assert_eq!(run("INBOX/", "%").untagged().len(), 1);
    }

    #[test]
    fn test_each_level_fetched_once() {
        let store = Arc::new(FixedStore::default());
        let mut session = session_with(store.clone());
        session.handle(b"A0 LOGIN user pass\r\n");

        let response = session.handle(b"A1 LIST \"\" *\r\n");
        assert_eq!(response.untagged().len(), 3);
        // root, inbox, inbox/starred and spam
        assert_eq!(store.mailbox_queries.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_list_everything() {
        let response = run("", "*");
        assert_eq!(response.message(), "LIST completed");
        assert_eq!(
            response.untagged(),
            [
                "LIST (\\HasChildren) \"/\" \"inbox\"",
                "LIST (\\HasNoChildren) \"/\" \"inbox/starred\"",
                "LIST (\\HasNoChildren) \"/\" \"spam\"",
            ]
        );
    }

    #[test]
    fn test_list_top_level() {
        let response = run("", "%");
        assert_eq!(response.untagged().len(), 2);
        assert!(response.untagged()[1].ends_with("\"spam\""));
    }

    #[test]
    fn test_list_with_reference() {
        let response = run("inbox/", "%");
        assert_eq!(
            response.untagged(),
            ["LIST (\\HasNoChildren) \"/\" \"inbox/starred\""]
        );
    }

    #[test]
    fn test_list_delimiter_query() {
        let response = run("", "");
        assert_eq!(response.untagged(), ["LIST (\\Noselect) \"/\" \"\""]);
    }

    #[test]
    fn test_list_requires_authentication() {
        let mut session = session();
        let response = Command::new(
            "A1",
            CommandBody::List {
                reference: String::new(),
                pattern: "*".to_string(),
            },
        )
        .execute(&mut session);
        assert_eq!(response.status(), Status::No);
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }
}
