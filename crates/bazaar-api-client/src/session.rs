//! Session credential store.
//!
//! The only owner of the logged-in credential. Every clone of a [`SessionStore`]
//! shares the same slot; writes go through [`SessionStore::set`] and
//! [`SessionStore::clear`] and are broadcast to subscribers.

use std::sync::Arc;

use bazaar_core::SessionCredential;
use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct SessionStore {
    inner: Arc<watch::Sender<Option<SessionCredential>>>,
}

impl SessionStore {
    /// Empty (logged out) store.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { inner: Arc::new(tx) }
    }

    pub fn with_credential(credential: SessionCredential) -> Self {
        let store = Self::new();
        store.set(credential);
        store
    }

    /// Store seeded from `BAZAAR_ACCESS_TOKEN` / `BAZAAR_REFRESH_TOKEN`.
    /// Missing access token means logged out.
    pub fn from_env() -> Self {
        match std::env::var("BAZAAR_ACCESS_TOKEN") {
            Ok(access) if !access.is_empty() => {
                let refresh = std::env::var("BAZAAR_REFRESH_TOKEN").unwrap_or_default();
                Self::with_credential(SessionCredential::new(access, refresh))
            }
            _ => Self::new(),
        }
    }

    pub fn current(&self) -> Option<SessionCredential> {
        self.inner.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .borrow()
            .as_ref()
            .map(|c| c.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .borrow()
            .as_ref()
            .map(|c| c.refresh_token.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn set(&self, credential: SessionCredential) {
        self.inner.send_replace(Some(credential));
        tracing::debug!("Session credential updated");
    }

    /// Drop the credential (logout). Returns the credential that was held.
    pub fn clear(&self) -> Option<SessionCredential> {
        let previous = self.inner.send_replace(None);
        if previous.is_some() {
            tracing::debug!("Session credential cleared");
        }
        previous
    }

    /// Receiver notified on every credential change.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionCredential>> {
        self.inner.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
