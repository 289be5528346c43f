// Session manager: throttle, history and expiry policy over the registry

use super::clock::{Clock, SystemClock};
use super::error::SessionError;
use super::storage::SessionRegistry;
use super::types::{SessionConfig, SessionEntry, SessionInfo, SessionState, SessionStats};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Attempts at minting an unused id before giving up
const MAX_ID_ATTEMPTS: usize = 3;

/// Session manager for handling session lifecycle and operations.
///
/// Expiry is checked lazily on every access: a session past `expires_at`
/// answers `NotFound` even while it is still linked in the registry waiting
/// for the next sweep.
pub struct SessionManager {
    registry: SessionRegistry,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    /// Create a session manager backed by the wall clock
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session with the configured lifetime
    pub async fn create(&self) -> Result<String, SessionError> {
        self.create_with_ttl(self.config.session_duration).await
    }

    /// Create a session that expires `ttl` from now
    pub async fn create_with_ttl(&self, ttl: Duration) -> Result<String, SessionError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let session_id = uuid::Uuid::new_v4().to_string();
            let entry = Arc::new(SessionEntry::new(
                session_id.clone(),
                self.clock.now(),
                ttl,
                self.config.history_capacity,
            ));

            if self.registry.insert(entry).await {
                info!("Created session {}", session_id);
                return Ok(session_id);
            }

            warn!("Session id collision on {}, retrying", session_id);
        }

        Err(SessionError::GenerationFailure)
    }

    /// Throttle and record one request snapshot
    pub async fn record_request(
        &self,
        session_id: &str,
        snapshot: String,
    ) -> Result<(), SessionError> {
        let config = &self.config;
        let result = self
            .with_live_session(session_id, |_, state, now| state.record(snapshot, now, config))
            .await;

        if result == Err(SessionError::RateLimited) {
            warn!("Rate limit exceeded for session {}", session_id);
        }
        result
    }

    /// Record a snapshot whose capture may have failed.
    ///
    /// Session outcomes take precedence: an unknown, expired or throttled
    /// session reports its `SessionError` whatever the capture result was.
    /// Only an admitted request surfaces the capture error, in the inner
    /// result, and it is not counted against the window.
    pub async fn record_capture<E>(
        &self,
        session_id: &str,
        capture: Result<String, E>,
    ) -> Result<Result<(), E>, SessionError> {
        let config = &self.config;
        let result = self
            .with_live_session(session_id, |_, state, now| {
                state.admit(now, config)?;
                Ok(capture.map(|snapshot| state.push(snapshot, config)))
            })
            .await;

        if let Err(SessionError::RateLimited) = result {
            warn!("Rate limit exceeded for session {}", session_id);
        }
        result
    }

    /// Stored request snapshots, oldest first
    pub async fn get_history(&self, session_id: &str) -> Result<Vec<String>, SessionError> {
        self.with_live_session(session_id, |_, state, _| {
            Ok(state.history.iter().cloned().collect())
        })
        .await
    }

    /// Extend a session that is close to expiry. Returns the new expiry.
    pub async fn extend(&self, session_id: &str) -> Result<DateTime<Utc>, SessionError> {
        let config = &self.config;
        let expires_at = self
            .with_live_session(session_id, |_, state, now| {
                state.extend(now, config)?;
                Ok(state.expires_at())
            })
            .await?;

        debug!("Extended session {} until {}", session_id, expires_at);
        Ok(expires_at)
    }

    /// Drop the history and reset the throttle window
    pub async fn clear(&self, session_id: &str) -> Result<(), SessionError> {
        self.with_live_session(session_id, |_, state, now| {
            state.clear(now);
            Ok(())
        })
        .await
    }

    /// Remove a session from the registry
    pub async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let entry = self
            .registry
            .remove(session_id)
            .await
            .ok_or(SessionError::NotFound)?;

        // An expired entry is unlinked all the same, but it was already
        // invisible to every other operation.
        let state = entry.lock().await;
        if state.is_expired(self.clock.now()) {
            return Err(SessionError::NotFound);
        }
        drop(state);

        info!("Session {} deleted", session_id);
        Ok(())
    }

    pub async fn info(&self, session_id: &str) -> Result<SessionInfo, SessionError> {
        self.with_live_session(session_id, |entry, state, _| {
            Ok(SessionInfo::from_state(entry.id(), state))
        })
        .await
    }

    /// Remove every session that expired before now
    pub async fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let count = self.registry.remove_expired(now).await;
        if count > 0 {
            debug!("Cleaned up {} expired sessions", count);
        }
        count
    }

    /// Number of linked sessions, including expired ones awaiting a sweep
    pub async fn len(&self) -> usize {
        self.registry.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.registry.is_empty().await
    }

    /// Whether the id is still linked in the registry, regardless of expiry
    pub async fn contains(&self, session_id: &str) -> bool {
        self.registry.contains(session_id).await
    }

    pub async fn stats(&self) -> SessionStats {
        let now = self.clock.now();
        SessionStats {
            total: self.registry.len().await,
            expired_pending: self.registry.count_expired(now).await,
        }
    }

    /// Resolve an id, lock the session, and run `f` if it has not expired.
    ///
    /// The registry read guard is released inside `registry.get` before the
    /// session lock is awaited. `now` is sampled after the session lock is
    /// held so concurrent callers see non-decreasing times per session.
    async fn with_live_session<T, F>(&self, session_id: &str, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&SessionEntry, &mut SessionState, DateTime<Utc>) -> Result<T, SessionError>,
    {
        let entry = self
            .registry
            .get(session_id)
            .await
            .ok_or(SessionError::NotFound)?;

        let mut state = entry.lock().await;
        let now = self.clock.now();
        if state.is_expired(now) {
            return Err(SessionError::NotFound);
        }

        f(entry.as_ref(), &mut *state, now)
    }
}

/// Session manager state for use in Axum handlers
#[derive(Clone)]
pub struct SessionManagerState {
    pub manager: Arc<SessionManager>,
}

impl SessionManagerState {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}
