//! Process-wide session state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use storefront_client_core::{BearerToken, Session, UserRecord};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::persistence::{MemoryPersistence, SessionPersistence, TOKEN_KEY, USER_KEY};

/// Holds the current session and mirrors it into durable storage.
///
/// Cloning is cheap and every clone shares the same state. Readers observe
/// changes through [`SessionStore::subscribe`]; only the store's own methods
/// mutate the session. Persistence failures are logged and never roll back
/// the in-memory state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    persistence: Box<dyn SessionPersistence>,
    state: watch::Sender<Session>,
    initialized: AtomicBool,
}

impl SessionStore {
    /// Create a store, restoring any persisted session.
    ///
    /// A persisted user record that does not parse, or that has no token
    /// alongside it, is discarded.
    pub fn new(persistence: impl SessionPersistence + 'static) -> Self {
        let restored = restore(&persistence);
        if restored.is_authenticated() {
            debug!("Restored persisted session");
        }
        Self {
            inner: Arc::new(SessionStoreInner {
                persistence: Box::new(persistence),
                state: watch::Sender::new(restored),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// A store backed by process memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryPersistence::new())
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn get(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// The current bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<BearerToken> {
        self.inner.state.borrow().token().cloned()
    }

    /// Whether a bearer token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Establish a session.
    pub fn set(&self, token: BearerToken, user: Option<UserRecord>) {
        // Storage is written under the watch lock so memory and disk change together.
        self.inner.state.send_modify(|session| {
            self.persist(TOKEN_KEY, Some(token.expose()));
            self.persist_user(user.as_ref());
            *session = Session::authenticated(token, user);
        });
    }

    /// Replace the user record, keeping the token.
    ///
    /// Ignored when there is no session, since a user without a token would
    /// not survive a restart.
    pub fn set_user(&self, user: UserRecord) {
        self.inner.state.send_if_modified(|session| {
            if !session.is_authenticated() {
                debug!("Ignoring user update without an active session");
                return false;
            }
            self.persist_user(Some(&user));
            *session = session.with_user(user);
            true
        });
    }

    /// Drop the session from memory and storage.
    pub fn clear(&self) {
        self.inner.state.send_modify(|session| {
            self.persist(TOKEN_KEY, None);
            self.persist(USER_KEY, None);
            *session = Session::anonymous();
        });
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Claim the one-shot startup validation.
    ///
    /// Returns `true` only for the first caller.
    #[must_use]
    pub fn begin_initialization(&self) -> bool {
        self.inner
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn persist_user(&self, user: Option<&UserRecord>) {
        match user.map(serde_json::to_string).transpose() {
            Ok(json) => self.persist(USER_KEY, json.as_deref()),
            Err(e) => warn!(error = %e, "Failed to serialize user record"),
        }
    }

    fn persist(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.inner.persistence.set(key, value),
            None => self.inner.persistence.delete(key),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "Failed to persist session");
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Read the persisted session, cleaning up anything unusable.
fn restore(persistence: &dyn SessionPersistence) -> Session {
    let token = match persistence.get(TOKEN_KEY) {
        Ok(Some(raw)) => match BearerToken::parse(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %e, "Discarding invalid persisted token");
                discard(persistence, TOKEN_KEY);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to read persisted token");
            None
        }
    };

    let user = match persistence.get(USER_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<UserRecord>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Discarding corrupt persisted user record");
                discard(persistence, USER_KEY);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to read persisted user record");
            None
        }
    };

    match token {
        Some(token) => Session::authenticated(token, user),
        None => {
            if user.is_some() {
                debug!("Discarding persisted user record without a token");
                discard(persistence, USER_KEY);
            }
            Session::anonymous()
        }
    }
}

fn discard(persistence: &dyn SessionPersistence, key: &str) {
    if let Err(e) = persistence.delete(key) {
        warn!(key, error = %e, "Failed to remove persisted session key");
    }
}
