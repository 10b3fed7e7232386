//! Contact records and the contact store collaborator.
//!
//! Contacts are owned per user identity. The one invariant the store
//! enforces is destination uniqueness: a user may not have two contacts
//! with the same destination account. Listing order is stable (insertion
//! order), which the send flow relies on for index-based selection.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use interpay::account::PaymentPointer;
use interpay::timestamp::UnixTimestamp;

/// A saved payee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Stable identifier for removal.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Destination account.
    pub destination: PaymentPointer,
    /// Optional free-text note.
    pub note: Option<String>,
    /// When the contact was registered.
    pub created_at: UnixTimestamp,
}

/// Contact store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContactError {
    /// The user already has a contact with this destination.
    #[error("a contact with that wallet address already exists")]
    Duplicate,

    /// The backing store failed.
    #[error("contact store failure: {0}")]
    Store(String),
}

/// The contact persistence collaborator.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Lists a user's contacts in stable (insertion) order.
    ///
    /// # Errors
    ///
    /// Returns a [`ContactError`] if the backing store fails.
    async fn list(&self, user_id: &str) -> Result<Vec<Contact>, ContactError>;

    /// Adds a contact, enforcing per-user destination uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::Duplicate`] if the user already has a
    /// contact with this destination, or a store failure otherwise.
    async fn add(
        &self,
        user_id: &str,
        name: String,
        destination: PaymentPointer,
        note: Option<String>,
    ) -> Result<Contact, ContactError>;

    /// Removes a contact by id. Returns `false` if no such contact exists.
    ///
    /// # Errors
    ///
    /// Returns a [`ContactError`] if the backing store fails.
    async fn remove(&self, user_id: &str, id: Uuid) -> Result<bool, ContactError>;
}

fn same_destination(a: &PaymentPointer, b: &PaymentPointer) -> bool {
    a.resolution_url() == b.resolution_url()
}

fn build_contact(name: String, destination: PaymentPointer, note: Option<String>) -> Contact {
    Contact {
        id: Uuid::new_v4(),
        name,
        destination,
        note,
        created_at: UnixTimestamp::now(),
    }
}

/// In-memory store, used by tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryContactStore {
    inner: Mutex<HashMap<String, Vec<Contact>>>,
}

impl MemoryContactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn list(&self, user_id: &str) -> Result<Vec<Contact>, ContactError> {
        Ok(self
            .inner
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add(
        &self,
        user_id: &str,
        name: String,
        destination: PaymentPointer,
        note: Option<String>,
    ) -> Result<Contact, ContactError> {
        let mut inner = self.inner.lock().await;
        let contacts = inner.entry(user_id.to_owned()).or_default();
        if contacts
            .iter()
            .any(|c| same_destination(&c.destination, &destination))
        {
            return Err(ContactError::Duplicate);
        }
        let contact = build_contact(name, destination, note);
        contacts.push(contact.clone());
        Ok(contact)
    }

    async fn remove(&self, user_id: &str, id: Uuid) -> Result<bool, ContactError> {
        let mut inner = self.inner.lock().await;
        let Some(contacts) = inner.get_mut(user_id) else {
            return Ok(false);
        };
        let before = contacts.len();
        contacts.retain(|c| c.id != id);
        Ok(contacts.len() != before)
    }
}

/// JSON file store: one document holding every user's contact list, read
/// and rewritten whole under an internal lock. Suits the bot's scale; a
/// database-backed store can replace it behind the same trait.
#[derive(Debug)]
pub struct JsonContactStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonContactStore {
    /// Creates a store over the given file path. The file is created on
    /// first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, Vec<Contact>>, ContactError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| ContactError::Store(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(ContactError::Store(e.to_string())),
        }
    }

    async fn save(&self, all: &HashMap<String, Vec<Contact>>) -> Result<(), ContactError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ContactError::Store(e.to_string()))?;
            }
        }
        let bytes =
            serde_json::to_vec_pretty(all).map_err(|e| ContactError::Store(e.to_string()))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| ContactError::Store(e.to_string()))
    }
}

#[async_trait]
impl ContactStore for JsonContactStore {
    async fn list(&self, user_id: &str) -> Result<Vec<Contact>, ContactError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(user_id).unwrap_or_default())
    }

    async fn add(
        &self,
        user_id: &str,
        name: String,
        destination: PaymentPointer,
        note: Option<String>,
    ) -> Result<Contact, ContactError> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        let contacts = all.entry(user_id.to_owned()).or_default();
        if contacts
            .iter()
            .any(|c| same_destination(&c.destination, &destination))
        {
            return Err(ContactError::Duplicate);
        }
        let contact = build_contact(name, destination, note);
        contacts.push(contact.clone());
        self.save(&all).await?;
        Ok(contact)
    }

    async fn remove(&self, user_id: &str, id: Uuid) -> Result<bool, ContactError> {
        let _guard = self.lock.lock().await;
        let mut all = self.load().await?;
        let Some(contacts) = all.get_mut(user_id) else {
            return Ok(false);
        };
        let before = contacts.len();
        contacts.retain(|c| c.id != id);
        let removed = contacts.len() != before;
        if removed {
            self.save(&all).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer(s: &str) -> PaymentPointer {
        PaymentPointer::parse(s).unwrap()
    }

    #[tokio::test]
    async fn duplicate_destination_is_rejected_per_user() {
        let store = MemoryContactStore::new();
        store
            .add("u1", "Bob".into(), pointer("$w.example/bob"), None)
            .await
            .unwrap();

        let err = store
            .add("u1", "Robert".into(), pointer("$w.example/bob"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::Duplicate));

        // A different user may register the same destination.
        store
            .add("u2", "Bob".into(), pointer("$w.example/bob"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn listing_order_is_stable() {
        let store = MemoryContactStore::new();
        for (name, dest) in [("A", "$w.example/a"), ("B", "$w.example/b"), ("C", "$w.example/c")] {
            store
                .add("u1", name.into(), pointer(dest), None)
                .await
                .unwrap();
        }
        let first = store.list("u1").await.unwrap();
        let second = store.list("u1").await.unwrap();
        let names: Vec<_> = first.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(
            first.iter().map(|c| c.id).collect::<Vec<_>>(),
            second.iter().map(|c| c.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn json_store_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");

        let store = JsonContactStore::new(&path);
        let added = store
            .add("u1", "Bob".into(), pointer("$w.example/bob"), Some("mate".into()))
            .await
            .unwrap();

        // A fresh store over the same file sees the contact.
        let reopened = JsonContactStore::new(&path);
        let contacts = reopened.list("u1").await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, added.id);
        assert_eq!(contacts[0].note.as_deref(), Some("mate"));

        assert!(reopened.remove("u1", added.id).await.unwrap());
        assert!(reopened.list("u1").await.unwrap().is_empty());
        assert!(!reopened.remove("u1", added.id).await.unwrap());
    }
}
