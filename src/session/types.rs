// Session types and data structures

use super::error::SessionError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Session policy configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum accepted requests per throttle window
    pub request_limit: u32,
    /// Length of the throttle window
    pub request_window: Duration,
    /// Lifetime of a new or extended session
    pub session_duration: Duration,
    /// Remaining lifetime below which a session may be extended
    pub extension_threshold: Duration,
    /// Number of request snapshots retained per session
    pub history_capacity: usize,
    /// Period of the expiration sweeper
    pub sweep_interval: std::time::Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_limit: 10,
            request_window: Duration::minutes(1),
            session_duration: Duration::hours(1),
            extension_threshold: Duration::minutes(10),
            history_capacity: 5,
            sweep_interval: std::time::Duration::from_secs(60),
        }
    }
}

/// Mutable session contents, only reachable through the session lock
#[derive(Debug)]
pub struct SessionState {
    /// Most recent request snapshots, oldest first
    pub history: VecDeque<String>,
    /// Requests accepted in the current throttle window
    pub request_count: u32,
    /// Start of the current throttle window, unset until the first request
    pub window_start: Option<DateTime<Utc>>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session becomes eligible for reclamation
    expires_at: DateTime<Utc>,
    /// Lock-free copy of `expires_at` in unix millis, shared with the entry
    expiry_mirror: Arc<AtomicI64>,
}

impl SessionState {
    fn new(now: DateTime<Utc>, ttl: Duration, capacity: usize) -> Self {
        let expires_at = now + ttl;
        Self {
            history: VecDeque::with_capacity(capacity),
            request_count: 0,
            window_start: None,
            created_at: now,
            expires_at,
            expiry_mirror: Arc::new(AtomicI64::new(expires_at.timestamp_millis())),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Every expiry write goes through here so the sweeper's copy stays current
    fn set_expires_at(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = expires_at;
        self.expiry_mirror
            .store(expires_at.timestamp_millis(), Ordering::Release);
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Apply the throttle and, if accepted, append the snapshot.
    pub fn record(
        &mut self,
        snapshot: String,
        now: DateTime<Utc>,
        config: &SessionConfig,
    ) -> Result<(), SessionError> {
        self.admit(now, config)?;
        self.push(snapshot, config);
        Ok(())
    }

    /// Throttle check without recording anything.
    ///
    /// The window is fixed, not sliding: once `request_window` has elapsed
    /// since `window_start` the counter resets outright. A client can
    /// therefore land `request_limit` requests just before a boundary and
    /// another `request_limit` just after it.
    pub fn admit(
        &mut self,
        now: DateTime<Utc>,
        config: &SessionConfig,
    ) -> Result<(), SessionError> {
        let window_elapsed = match self.window_start {
            Some(start) => now - start > config.request_window,
            None => true,
        };
        if window_elapsed {
            self.request_count = 0;
            self.window_start = Some(now);
        }

        if self.request_count >= config.request_limit {
            return Err(SessionError::RateLimited);
        }

        Ok(())
    }

    /// Append an admitted snapshot, evicting the oldest at capacity
    pub fn push(&mut self, snapshot: String, config: &SessionConfig) {
        if config.history_capacity == 0 {
            self.history.clear();
        } else {
            while self.history.len() >= config.history_capacity {
                self.history.pop_front();
            }
            self.history.push_back(snapshot);
        }
        self.request_count += 1;
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.history.clear();
        self.request_count = 0;
        self.window_start = Some(now);
    }

    /// Push the expiry out to `now + session_duration` if it is close enough.
    pub fn extend(
        &mut self,
        now: DateTime<Utc>,
        config: &SessionConfig,
    ) -> Result<(), SessionError> {
        if self.expires_at - now >= config.extension_threshold {
            return Err(SessionError::ExtensionNotNeeded);
        }

        let extended = now + config.session_duration;
        // expiry never moves backwards
        if extended > self.expires_at {
            self.set_expires_at(extended);
        }
        Ok(())
    }
}

/// Registry entry for one session.
///
/// The registry hands out `Arc<SessionEntry>` so a caller that resolved an id
/// can still lock the entry after it has been unlinked by `delete` or the
/// sweeper. The expiry is mirrored into an atomic so the sweeper can scan
/// without touching any session lock. The mirror is owned jointly with the
/// state and only written by it, so it is only written under the state lock.
#[derive(Debug)]
pub struct SessionEntry {
    id: String,
    expires_at_millis: Arc<AtomicI64>,
    state: Mutex<SessionState>,
}

impl SessionEntry {
    pub fn new(id: String, now: DateTime<Utc>, ttl: Duration, capacity: usize) -> Self {
        let state = SessionState::new(now, ttl, capacity);
        Self {
            id,
            expires_at_millis: state.expiry_mirror.clone(),
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Expiry check used by the sweeper; never takes the state lock
    pub fn expired_before(&self, now: DateTime<Utc>) -> bool {
        self.expires_at_millis.load(Ordering::Acquire) < now.timestamp_millis()
    }
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub request_count: u32,
    pub window_start: Option<DateTime<Utc>>,
    pub history_len: usize,
}

impl SessionInfo {
    pub fn from_state(id: &str, state: &SessionState) -> Self {
        Self {
            session_id: id.to_string(),
            created_at: state.created_at,
            expires_at: state.expires_at,
            request_count: state.request_count,
            window_start: state.window_start,
            history_len: state.history.len(),
        }
    }
}

/// Registry statistics for monitoring
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStats {
    /// Entries currently linked in the registry
    pub total: usize,
    /// Entries past their expiry that the sweeper has not reclaimed yet
    pub expired_pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(now: DateTime<Utc>) -> SessionState {
        let config = SessionConfig::default();
        SessionState::new(now, config.session_duration, config.history_capacity)
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.request_limit, 10);
        assert_eq!(config.request_window, Duration::seconds(60));
        assert_eq!(config.session_duration, Duration::seconds(3600));
        assert_eq!(config.extension_threshold, Duration::seconds(600));
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.sweep_interval, std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_history_keeps_most_recent() {
        let config = SessionConfig::default();
        let now = Utc::now();
        let mut state = state_at(now);

        for i in 0..7 {
            state.record(format!("req-{}", i), now, &config).unwrap();
        }

        let history: Vec<&str> = state.history.iter().map(String::as_str).collect();
        assert_eq!(history, vec!["req-2", "req-3", "req-4", "req-5", "req-6"]);
        assert_eq!(state.request_count, 7);
    }

    #[test]
    fn test_first_request_opens_window() {
        let config = SessionConfig::default();
        let created = Utc::now();
        let mut state = state_at(created);
        assert!(state.window_start.is_none());

        let later = created + Duration::seconds(30);
        state.record("a".to_string(), later, &config).unwrap();
        assert_eq!(state.window_start, Some(later));
    }

    #[test]
    fn test_rate_limited_leaves_state_untouched() {
        let config = SessionConfig::default();
        let now = Utc::now();
        let mut state = state_at(now);

        for i in 0..10 {
            state.record(format!("req-{}", i), now, &config).unwrap();
        }
        let before: Vec<String> = state.history.iter().cloned().collect();

        let result = state.record("req-10".to_string(), now, &config);
        assert_eq!(result, Err(SessionError::RateLimited));
        assert_eq!(state.request_count, 10);
        assert_eq!(state.history.iter().cloned().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let config = SessionConfig::default();
        let now = Utc::now();
        let mut state = state_at(now);

        for _ in 0..10 {
            state.record("x".to_string(), now, &config).unwrap();
        }

        // exactly one window later is not yet past it
        let edge = now + config.request_window;
        assert_eq!(
            state.record("x".to_string(), edge, &config),
            Err(SessionError::RateLimited)
        );

        let past = edge + Duration::milliseconds(1);
        state.record("x".to_string(), past, &config).unwrap();
        assert_eq!(state.request_count, 1);
        assert_eq!(state.window_start, Some(past));
    }

    #[test]
    fn test_extend_threshold() {
        let config = SessionConfig::default();
        let now = Utc::now();
        let mut state = state_at(now);
        let original = state.expires_at;

        assert_eq!(
            state.extend(now, &config),
            Err(SessionError::ExtensionNotNeeded)
        );
        assert_eq!(state.expires_at, original);

        // exactly at the threshold still counts as not needed
        let at_threshold = original - config.extension_threshold;
        assert_eq!(
            state.extend(at_threshold, &config),
            Err(SessionError::ExtensionNotNeeded)
        );

        let near = original - Duration::minutes(5);
        state.extend(near, &config).unwrap();
        assert_eq!(state.expires_at, near + config.session_duration);
    }

    #[test]
    fn test_clear_resets_counters_but_not_expiry() {
        let config = SessionConfig::default();
        let now = Utc::now();
        let mut state = state_at(now);
        let expires_at = state.expires_at;

        state.record("a".to_string(), now, &config).unwrap();
        let later = now + Duration::seconds(5);
        state.clear(later);

        assert!(state.history.is_empty());
        assert_eq!(state.request_count, 0);
        assert_eq!(state.window_start, Some(later));
        assert_eq!(state.expires_at, expires_at);
    }

    #[tokio::test]
    async fn test_entry_expiry_mirror() {
        let now = Utc::now();
        let entry = SessionEntry::new("s".to_string(), now, Duration::seconds(10), 5);
        assert!(!entry.expired_before(now + Duration::seconds(5)));
        assert!(entry.expired_before(now + Duration::seconds(11)));

        let near = now + Duration::seconds(5);
        {
            let mut state = entry.lock().await;
            state.extend(near, &SessionConfig::default()).unwrap();
            assert_eq!(state.expires_at(), near + Duration::hours(1));
        }

        // the sweeper's view follows the extension without any extra step
        assert!(!entry.expired_before(now + Duration::seconds(11)));
        assert!(!entry.expired_before(near + Duration::minutes(59)));
        assert!(entry.expired_before(near + Duration::hours(1) + Duration::seconds(1)));
    }

    #[test]
    fn test_admit_then_push() {
        let config = SessionConfig::default();
        let now = Utc::now();
        let mut state = state_at(now);

        state.admit(now, &config).unwrap();
        assert_eq!(state.request_count, 0);
        assert!(state.history.is_empty());

        state.push("a".to_string(), &config);
        assert_eq!(state.request_count, 1);
        assert_eq!(state.history.len(), 1);
    }
}
