//! The (user, destination) authorization gate.
//!
//! A transfer may only target a destination the user has registered as a
//! contact. The gate is a pure lookup over the contact store (it mutates
//! nothing) and it is checked by the conversation layer before the
//! payment orchestrator is ever invoked, so a denial costs no network
//! calls and no grant negotiation.

use std::sync::Arc;

use interpay::account::PaymentPointer;

use crate::contacts::ContactStore;

/// Whitelist check over registered contacts.
#[derive(Clone)]
pub struct AuthorizationGate {
    store: Arc<dyn ContactStore>,
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate").finish_non_exhaustive()
    }
}

impl AuthorizationGate {
    /// Creates a gate over the given contact store.
    #[must_use]
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }

    /// Returns `true` iff the user has a registered contact with this
    /// destination. Store failures deny: the gate fails closed.
    pub async fn is_allowed(&self, user_id: &str, destination: &PaymentPointer) -> bool {
        match self.store.list(user_id).await {
            Ok(contacts) => contacts
                .iter()
                .any(|c| c.destination.resolution_url() == destination.resolution_url()),
            Err(e) => {
                tracing::warn!(user = user_id, error = %e, "contact lookup failed, denying");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::MemoryContactStore;

    #[tokio::test]
    async fn denied_until_the_contact_exists() {
        let store = Arc::new(MemoryContactStore::new());
        let gate = AuthorizationGate::new(Arc::clone(&store) as Arc<dyn ContactStore>);
        let bob = PaymentPointer::parse("$w.example/bob").unwrap();

        assert!(!gate.is_allowed("u1", &bob).await);

        store
            .add("u1", "Bob".into(), bob.clone(), None)
            .await
            .unwrap();
        assert!(gate.is_allowed("u1", &bob).await);

        // Another user's contacts don't leak into this user's whitelist.
        assert!(!gate.is_allowed("u2", &bob).await);
    }
}
