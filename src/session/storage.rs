// Session registry: the set of live sessions

use super::types::SessionEntry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Map from session id to session entry.
///
/// The lock here guards membership only. Session contents live behind each
/// entry's own lock, and every accessor returns before that lock is taken,
/// so callers always acquire registry-then-session and never hold both.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Link a new entry. Returns false if the id is already taken.
    pub async fn insert(&self, entry: Arc<SessionEntry>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.entry(entry.id().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id)
    }

    /// Unlink every entry whose expiry is strictly before `now`.
    pub async fn remove_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.expired_before(now));
        let removed = before - sessions.len();

        if removed > 0 {
            debug!("Removed {} expired sessions from registry", removed);
        }

        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Count linked entries that are already past their expiry
    pub async fn count_expired(&self, now: DateTime<Utc>) -> usize {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|entry| entry.expired_before(now))
            .count()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
