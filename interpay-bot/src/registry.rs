//! At-most-one-session-per-user registry.
//!
//! Each user identity maps to one slot: a mutex over the user's optional
//! session. Holding the slot's lock is the only way to read or advance the
//! session, so two events for the same user can never act on two copies of
//! its state. Events for distinct users take distinct slots and proceed
//! fully in parallel; the map itself is safe under concurrent insertion.
//!
//! Removing a session clears the slot's contents but keeps the slot: the
//! per-user mutex is the serialization point for that user's events and
//! must outlive any individual flow.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::session::ConversationSession;

/// One user's session slot.
pub type SessionSlot = Arc<Mutex<Option<ConversationSession>>>;

/// Process-wide map from user identity to session slot.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: DashMap<String, SessionSlot>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for a user, creating it on first use.
    #[must_use]
    pub fn slot(&self, user_id: &str) -> SessionSlot {
        let slot = self.slots.entry(user_id.to_owned()).or_default();
        Arc::clone(&slot)
    }
}
