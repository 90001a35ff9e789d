//! Session lookup table.
//!
//! [`SessionManager`] hands out the [`Session`] for an id, creating it on first
//! request. It implements `Default`, so a registry can build it lazily like any
//! other dependency.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// A client session: an id plus string attributes.
///
/// Cloning is cheap and clones share their attributes.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: Vec<u8>,
    values: Mutex<HashMap<String, String>>,
}

impl Session {
    fn new(id: &[u8]) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: id.to_vec(),
                values: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &[u8] {
        &self.inner.id
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    /// Sets attribute `key`, returning its previous value.
    pub fn set_value(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values().insert(key.into(), value.into())
    }

    pub fn remove_value(&self, key: &str) -> Option<String> {
        self.values().remove(key)
    }

    /// Whether both handles refer to the same session.
    #[must_use]
    pub fn same_session(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.inner.values.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &String::from_utf8_lossy(&self.inner.id))
            .finish_non_exhaustive()
    }
}

/// Source of sessions keyed by id.
pub trait SessionProvider {
    /// Returns the session `id`, creating it if it does not exist yet.
    fn get(&self, id: &[u8]) -> Session;

    /// Forgets session `id`. Handles already given out stay usable.
    fn remove_session(&self, id: &[u8]);
}

/// In-memory [`SessionProvider`].
#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<Vec<u8>, Session>>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, id: &[u8]) -> bool {
        self.sessions().contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Vec<u8>, Session>> {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl SessionProvider for SessionManager {
    fn get(&self, id: &[u8]) -> Session {
        let mut sessions = self.sessions();

        if let Some(session) = sessions.get(id) {
            return session.clone();
        }

        debug!(id = %String::from_utf8_lossy(id), "session created");
        let session = Session::new(id);
        sessions.insert(id.to_vec(), session.clone());
        session
    }

    fn remove_session(&self, id: &[u8]) {
        let removed = self.sessions().remove(id);

        if removed.is_some() {
            debug!(id = %String::from_utf8_lossy(id), "session removed");
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.len())
            .finish()
    }
}
