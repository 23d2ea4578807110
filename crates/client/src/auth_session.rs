//! Authentication session management with persistent storage.
//!
//! `SessionStore` owns the bearer token and publishes an authenticated
//! signal that gates everything session-scoped: executor auto-run, polling
//! loops, and the notification hub's socket. Dropping the signal to false
//! is how the 401 interceptor tears all of those down.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::watch;

use crate::storage;

const SESSION_KEY: &str = "jobdash_session";

/// Stored session data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub role: String,
}

/// Process-wide session holder.
///
/// The token is read-many/write-rare shared state; the sole reactive
/// writer is [`SessionStore::invalidate`], driven by the transport's 401
/// interceptor.
#[derive(Debug)]
pub struct SessionStore {
    inner: Mutex<Option<Session>>,
    authed: watch::Sender<bool>,
    persist: bool,
}

impl SessionStore {
    /// Create a store, restoring any persisted session.
    pub fn new() -> Self {
        let restored: Option<Session> = storage::load(SESSION_KEY);
        let (authed, _) = watch::channel(restored.is_some());
        Self {
            inner: Mutex::new(restored),
            authed,
            persist: true,
        }
    }

    /// Create a store that neither restores nor persists anything. Used by
    /// tests and ephemeral tooling.
    pub fn ephemeral() -> Self {
        let (authed, _) = watch::channel(false);
        Self {
            inner: Mutex::new(None),
            authed,
            persist: false,
        }
    }

    /// Store a new session and raise the authenticated signal.
    pub fn login(&self, session: Session) {
        if self.persist {
            storage::save(SESSION_KEY, &session);
        }
        *self.inner.lock().expect("session lock") = Some(session);
        let _ = self.authed.send(true);
    }

    /// Clear the session and drop the authenticated signal.
    pub fn logout(&self) {
        if self.persist {
            storage::remove(SESSION_KEY);
        }
        *self.inner.lock().expect("session lock") = None;
        let _ = self.authed.send(false);
    }

    /// Reactive session reset: the transport calls this on any 401 so the
    /// whole session tears down no matter which request tripped it.
    pub fn invalidate(&self) {
        tracing::warn!("session invalidated by server (401)");
        self.logout();
    }

    /// Current bearer token, if authenticated.
    pub fn token(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("session lock")
            .as_ref()
            .map(|s| s.token.clone())
    }

    /// Current session, if any.
    pub fn current(&self) -> Option<Session> {
        self.inner.lock().expect("session lock").clone()
    }

    pub fn is_authenticated(&self) -> bool {
        *self.authed.borrow()
    }

    /// Subscribe to authentication transitions.
    pub fn watch_authenticated(&self) -> watch::Receiver<bool> {
        self.authed.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
