//! Session capability
//!
//! The strategy never owns session storage. It needs exactly one slot (the
//! pending OAuth2 state) and reaches it through [`SessionStore`], which the
//! host implements on top of whatever session layer it already runs.
//!
//! [`SharedSession`] is a ready-made in-memory store. The middleware looks
//! for one in request extensions, so a host session layer only has to insert
//! it before the auth layer runs.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Key/value access to the current user's session
pub trait SessionStore: Send {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value, replacing any previous one
    fn insert(&mut self, key: &str, value: String);

    /// Remove a value, returning it if it was present
    fn remove(&mut self, key: &str) -> Option<String>;
}

impl SessionStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }

    fn insert(&mut self, key: &str, value: String) {
        HashMap::insert(self, key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        HashMap::remove(self, key)
    }
}

/// Cloneable session handle shared between the host and the auth middleware
///
/// All clones see the same data. Locks are held only for the duration of a
/// single operation.
///
/// # Example
///
/// ```rust
/// use scalus_oauth2::session::{SessionStore, SharedSession};
///
/// let session = SharedSession::new();
/// let mut handle = session.clone();
/// handle.insert("omniauth.state", "abc".to_string());
///
/// assert_eq!(session.get("omniauth.state").as_deref(), Some("abc"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    data: Arc<Mutex<HashMap<String, String>>>,
}

impl SharedSession {
    /// Create an empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session pre-populated with `data`
    #[must_use]
    pub fn from_map(data: HashMap<String, String>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Copy of the current contents, for persisting by the host
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.data.lock().clone()
    }
}

impl SessionStore for SharedSession {
    fn get(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }

    fn insert(&mut self, key: &str, value: String) {
        self.data.lock().insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        self.data.lock().remove(key)
    }
}
