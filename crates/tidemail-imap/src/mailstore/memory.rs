//! In-memory mail store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Authenticator, Mailstore, StoreError};
use crate::types::{Mailbox, split_path};

/// First UIDVALIDITY handed out.
const FIRST_MAILBOX_ID: u32 = 1;

struct Message {
    seen: bool,
}

struct Folder {
    mailbox: Mailbox,
    messages: Vec<Message>,
    next_uid: u32,
}

#[derive(Default)]
struct Inner {
    folders: Vec<Folder>,
    users: HashMap<String, String>,
}

impl Inner {
    fn folder(&self, id: u32) -> Result<&Folder, StoreError> {
        self.folders
            .iter()
            .find(|folder| folder.mailbox.id == id)
            .ok_or(StoreError::NoSuchMailbox(id))
    }

    fn folder_by_path_mut(&mut self, path: &[String]) -> Option<&mut Folder> {
        self.folders
            .iter_mut()
            .find(|folder| folder.mailbox.path == path)
    }

    fn next_id(&self) -> Result<u32, StoreError> {
        match self.folders.iter().map(|folder| folder.mailbox.id).max() {
            None => Ok(FIRST_MAILBOX_ID),
            Some(id) => id
                .checked_add(1)
                .ok_or_else(|| StoreError::Exhausted("mailbox ids".to_string())),
        }
    }
}

/// Mail store and authenticator that keeps everything in memory.
///
/// Messages are reduced to the metadata the engine asks about: a UID and a
/// seen flag.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    /// Registers a user, replacing any previous password.
    pub fn add_user(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<(), StoreError> {
        self.write()?.users.insert(username.into(), password.into());
        Ok(())
    }

    /// Creates a mailbox and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the mailbox itself exists.
    pub fn create_mailbox(&self, name: &str) -> Result<Mailbox, StoreError> {
        let path = split_path(name);
        let mut inner = self.write()?;

        if inner.folder_by_path_mut(&path).is_some() {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }

        let mut created = None;
        for depth in 1..=path.len() {
            let prefix = &path[..depth];
            if inner.folder_by_path_mut(prefix).is_some() {
                continue;
            }
            let mailbox = Mailbox::new(inner.next_id()?, prefix.to_vec());
            inner.folders.push(Folder {
                mailbox: mailbox.clone(),
                messages: Vec::new(),
                next_uid: 1,
            });
            created = Some(mailbox);
        }

        created.ok_or_else(|| StoreError::Unavailable(format!("invalid mailbox name {name:?}")))
    }

    /// Adds a message to a mailbox and returns its UID.
    pub fn append(&self, name: &str, seen: bool) -> Result<Option<u32>, StoreError> {
        let path = split_path(name);
        let mut inner = self.write()?;

        let Some(folder) = inner.folder_by_path_mut(&path) else {
            return Ok(None);
        };
        let uid = folder.next_uid;
        folder.next_uid = uid
            .checked_add(1)
            .ok_or_else(|| StoreError::Exhausted(format!("UIDs of {name}")))?;
        folder.messages.push(Message { seen });
        Ok(Some(uid))
    }
}

impl Mailstore for MemoryStore {
    fn get_mailbox(&self, name: &str) -> Result<Option<Mailbox>, StoreError> {
        let path = split_path(name);
        Ok(self
            .read()?
            .folders
            .iter()
            .find(|folder| folder.mailbox.path == path)
            .map(|folder| folder.mailbox.clone()))
    }

    fn get_mailboxes(&self, path: &[String]) -> Result<Vec<Mailbox>, StoreError> {
        Ok(self
            .read()?
            .folders
            .iter()
            .filter(|folder| {
                folder.mailbox.path.len() == path.len() + 1 && folder.mailbox.path.starts_with(path)
            })
            .map(|folder| folder.mailbox.clone())
            .collect())
    }

    fn first_unseen(&self, mailbox: u32) -> Result<u32, StoreError> {
        let inner = self.read()?;
        let position = inner
            .folder(mailbox)?
            .messages
            .iter()
            .position(|message| !message.seen);
        Ok(position.map_or(0, |index| u32::try_from(index + 1).unwrap_or(u32::MAX)))
    }

    fn total_messages(&self, mailbox: u32) -> Result<u32, StoreError> {
        let inner = self.read()?;
        let total = inner.folder(mailbox)?.messages.len();
        Ok(u32::try_from(total).unwrap_or(u32::MAX))
    }

    fn recent_messages(&self, mailbox: u32) -> Result<u32, StoreError> {
        let inner = self.read()?;
        let unseen = inner
            .folder(mailbox)?
            .messages
            .iter()
            .filter(|message| !message.seen)
            .count();
        Ok(u32::try_from(unseen).unwrap_or(u32::MAX))
    }

    fn next_uid(&self, mailbox: u32) -> Result<u32, StoreError> {
        Ok(self.read()?.folder(mailbox)?.next_uid)
    }
}

impl Authenticator for MemoryStore {
    fn authenticate(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        Ok(self
            .read()?
            .users
            .get(username)
            .is_some_and(|expected| expected == password))
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

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_mailbox("INBOX").unwrap();
        store.create_mailbox("INBOX/starred").unwrap();
        store.create_mailbox("spam").unwrap();
        store
    }

    #[test]
    fn test_lookup_by_name() {
        let store = store();
        let inbox = store.get_mailbox("INBOX").unwrap().unwrap();
        assert_eq!(inbox.id, 1);
        assert_eq!(inbox.name, "INBOX");

        let starred = store.get_mailbox("INBOX/starred").unwrap().unwrap();
        assert_eq!(starred.path, vec!["INBOX", "starred"]);
        assert_eq!(starred.id, 2);

        assert!(store.get_mailbox("missing").unwrap().is_none());
    }

    #[test]
    fn test_create_makes_parents() {
        let store = MemoryStore::new();
        let leaf = store.create_mailbox("a/b/c").unwrap();
        assert_eq!(leaf.id, 3);
        assert!(store.get_mailbox("a").unwrap().is_some());
        assert!(store.get_mailbox("a/b").unwrap().is_some());
        assert!(matches!(
            store.create_mailbox("a/b"),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_children() {
        let store = store();
        let root: Vec<_> = store
            .get_mailboxes(&[])
            .unwrap()
            .into_iter()
            .map(|m| m.full_name())
            .collect();
        assert_eq!(root, vec!["INBOX", "spam"]);

        let children = store.get_mailboxes(&["INBOX".to_string()]).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "starred");

        assert!(store.get_mailboxes(&["spam".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_first_unseen_when_all_seen() {
        let store = store();
        store.append("spam", true).unwrap();
        store.append("spam", true).unwrap();
        assert_eq!(store.first_unseen(3).unwrap(), 0);

        store.append("spam", false).unwrap();
        assert_eq!(store.first_unseen(3).unwrap(), 3);
    }

    #[test]
    fn test_counters() {
        let store = store();
        assert_eq!(store.append("INBOX", true).unwrap(), Some(1));
        assert_eq!(store.append("INBOX", false).unwrap(), Some(2));
        assert_eq!(store.append("INBOX", false).unwrap(), Some(3));
        assert_eq!(store.append("missing", false).unwrap(), None);

        assert_eq!(store.total_messages(1).unwrap(), 3);
        assert_eq!(store.recent_messages(1).unwrap(), 2);
        assert_eq!(store.first_unseen(1).unwrap(), 2);
        assert_eq!(store.next_uid(1).unwrap(), 4);

        assert_eq!(store.first_unseen(3).unwrap(), 0);
        assert!(matches!(
            store.total_messages(42),
            Err(StoreError::NoSuchMailbox(42))
        ));
    }

    #[test]
    fn test_uid_overflow() {
        let store = store();
        store.write().unwrap().folders[0].next_uid = u32::MAX;

        assert!(matches!(
            store.append("INBOX", false),
            Err(StoreError::Exhausted(_))
        ));
        assert_eq!(store.total_messages(1).unwrap(), 0);
        assert_eq!(store.next_uid(1).unwrap(), u32::MAX);
    }

    #[test]
    fn test_mailbox_id_overflow() {
        let store = store();
        store.write().unwrap().folders[2].mailbox.id = u32::MAX;

        assert!(matches!(
            store.create_mailbox("trash"),
            Err(StoreError::Exhausted(_))
        ));
        assert!(store.get_mailbox("trash").unwrap().is_none());
    }

    #[test]
    fn test_authenticate() {
        let store = store();
        store.add_user("alice", "secret").unwrap();
        assert!(store.authenticate("alice", "secret").unwrap());
        assert!(!store.authenticate("alice", "wrong").unwrap());
        assert!(!store.authenticate("bob", "secret").unwrap());
    }
}
