//! Session credential slot shared by both transports.
//!
//! ARCHITECTURE
//! ============
//! One process-wide slot holds at most one opaque bearer credential;
//! absence means logged out. The store is an explicit, injectable handle
//! (cloning shares the slot) rather than ambient global state, so the
//! gateway, streaming channel, and navigation gate all observe the same
//! credential without hidden coupling. An optional backing file makes the
//! credential durable across restarts.
//!
//! Writer discipline: only successful login/registration, explicit logout,
//! and authentication-failure eviction mutate the slot. Everything else
//! reads. A `std::sync` lock is enough because no critical section ever
//! holds across an await point.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cloneable handle to the process-wide credential slot.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    credential: Arc<RwLock<Option<String>>>,
    backing: Option<Arc<PathBuf>>,
}

impl SessionStore {
    /// Create an empty, in-memory (logged-out) store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a file so the credential survives restarts.
    /// A missing or unreadable file starts logged out.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let credential = std::fs::read_to_string(&path)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());
        Self {
            credential: Arc::new(RwLock::new(credential)),
            backing: Some(Arc::new(path)),
        }
    }

    /// The stored credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<String> {
        self.read().clone()
    }

    /// Whether a credential is currently present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Replace the slot with a freshly issued credential.
    pub fn store(&self, credential: impl Into<String>) {
        let mut slot = self.write();
        *slot = Some(credential.into());
        self.persist(&slot);
        tracing::debug!("credential stored");
    }

    /// Clear the slot, restoring the logged-out state. Idempotent.
    pub fn evict(&self) {
        let mut slot = self.write();
        if slot.take().is_some() {
            tracing::debug!("credential evicted");
        }
        self.persist(&slot);
    }

    /// The shared credential-attachment policy: attach the stored
    /// credential as a bearer header, or pass the request through
    /// unauthenticated. Both the buffered gateway and the streaming
    /// channel route every outgoing request through here.
    pub(crate) fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credential() {
            Some(credential) => request.bearer_auth(credential),
            None => request,
        }
    }

    /// Mirror the slot to the backing file, best-effort. Called with the
    /// write lock held so file contents follow slot order.
    fn persist(&self, slot: &Option<String>) {
        let Some(path) = &self.backing else { return };
        let result = match slot {
            Some(credential) => std::fs::write(path.as_ref(), credential),
            None => match std::fs::remove_file(path.as_ref()) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist credential slot");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.credential.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.credential.write().unwrap_or_else(PoisonError::into_inner)
    }
}
