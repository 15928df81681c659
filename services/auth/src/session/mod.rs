//! Session lifecycle
//!
//! [`SessionManager`] creates, resolves, refreshes and deletes sessions over
//! an injected [`SessionStore`]. A session is valid while `now < expires_at`;
//! a lookup inside the refresh threshold slides the expiry forward, and an
//! expired record found on read is deleted on the spot. The periodic sweep
//! in [`crate::sweeper`] removes the ones nobody reads again.

mod memory;
mod postgres;
mod redis;
mod store;

use std::sync::Arc;

use anyhow::{Result, ensure};
use chrono::Duration;
use common::{Clock, RetryPolicy, StoreResult, with_retry};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;
pub use redis::RedisSessionStore;
pub use store::{Lookup, SessionStore};

use crate::models::Session;
use crate::token::{fingerprint, generate_session_token};

/// Which [`SessionStore`] implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Postgres,
    Redis,
}

/// Expiry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Lifetime of a fresh or refreshed session.
    pub ttl: Duration,
    /// A lookup with less than this left before expiry extends the session.
    pub refresh_threshold: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            refresh_threshold: Duration::hours(24),
        }
    }
}

impl SessionPolicy {
    pub fn new(ttl: Duration, refresh_threshold: Duration) -> Result<Self> {
        ensure!(ttl > Duration::zero(), "session TTL must be positive");
        ensure!(
            refresh_threshold >= Duration::zero(),
            "refresh threshold must not be negative"
        );
        ensure!(
            refresh_threshold <= ttl,
            "refresh threshold must not exceed the session TTL"
        );
        Ok(Self {
            ttl,
            refresh_threshold,
        })
    }

    /// Build a policy from second-based settings.
    pub fn from_secs(ttl_secs: i64, refresh_threshold_secs: i64) -> Result<Self> {
        Self::new(
            Duration::seconds(ttl_secs),
            Duration::seconds(refresh_threshold_secs),
        )
    }
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
    retry: RetryPolicy,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, policy: SessionPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Issue a new session for an account and persist it.
    ///
    /// The token is generated once, so retried inserts write the same record.
    /// Failures are returned: a login must not succeed without a stored session.
    pub async fn create(&self, user_id: i64, username: &str) -> StoreResult<Session> {
        let now = self.clock.now();
        let session = Session {
            token: generate_session_token(),
            user_id,
            username: username.to_string(),
            expires_at: now + self.policy.ttl,
            created_at: now,
            updated_at: now,
        };

        let stored = with_retry(&self.retry, "session insert", || {
            self.store.insert(&session)
        })
        .await;

        match stored {
            Ok(()) => {
                info!(
                    "Created session {} for user {}",
                    fingerprint(&session.token),
                    user_id
                );
                Ok(session)
            }
            Err(e) => {
                error!("Failed to store session for user {}: {}", user_id, e);
                Err(e)
            }
        }
    }

    /// Resolve a token to a live session, refreshing it when close to expiry.
    ///
    /// Store failures are logged and reported as "no session".
    pub async fn get(&self, token: &str) -> Option<Session> {
        let now = self.clock.now();
        let refresh_before = now + self.policy.refresh_threshold;
        let extended_until = now + self.policy.ttl;

        let lookup = with_retry(&self.retry, "session lookup", || {
            self.store.touch(token, now, refresh_before, extended_until)
        })
        .await;

        match lookup {
            Ok(Lookup::Missing) => None,
            Ok(Lookup::Expired) => {
                debug!("Session {} expired, deleted", fingerprint(token));
                None
            }
            Ok(Lookup::Refreshed(session)) => {
                debug!(
                    "Session {} refreshed until {}",
                    fingerprint(token),
                    session.expires_at
                );
                Some(session)
            }
            Ok(Lookup::Active(session)) => Some(session),
            Err(e) => {
                warn!(
                    "Session lookup for {} failed, treating as unauthenticated: {}",
                    fingerprint(token),
                    e
                );
                None
            }
        }
    }

    /// Delete a session. Unknown tokens and store failures are not errors.
    pub async fn delete(&self, token: &str) {
        match with_retry(&self.retry, "session delete", || self.store.remove(token)).await {
            Ok(true) => info!("Deleted session {}", fingerprint(token)),
            Ok(false) => debug!("Session {} already gone", fingerprint(token)),
            Err(e) => error!("Failed to delete session {}: {}", fingerprint(token), e),
        }
    }

    /// Delete every expired session. Returns how many were removed.
    pub async fn sweep(&self) -> StoreResult<u64> {
        let now = self.clock.now();
        let removed =
            with_retry(&self.retry, "session sweep", || self.store.remove_expired(now)).await;
        match removed {
            Ok(removed) => {
                info!("Session sweep removed {} expired sessions", removed);
                Ok(removed)
            }
            Err(e) => {
                error!("Session sweep failed: {}", e);
                Err(e)
            }
        }
    }

    /// Live sessions of a user, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<Session>> {
        let now = self.clock.now();
        with_retry(&self.retry, "session listing", || {
            self.store.list_for_user(user_id, now)
        })
        .await
    }

    /// Log a user out everywhere.
    pub async fn delete_all_for_user(&self, user_id: i64) -> StoreResult<u64> {
        let removed = with_retry(&self.retry, "session bulk delete", || {
            self.store.remove_for_user(user_id)
        })
        .await
        .inspect_err(|e| error!("Failed to delete sessions of user {}: {}", user_id, e))?;

        info!("Deleted {} sessions for user {}", removed, user_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use common::{ManualClock, StoreError};

    struct Fixture {
        clock: Arc<ManualClock>,
        store: MemorySessionStore,
        manager: SessionManager,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let store = MemorySessionStore::new();
        let manager = SessionManager::new(
            Arc::new(store.clone()),
            clock.clone(),
            SessionPolicy::default(),
        )
        .with_retry(RetryPolicy::no_retry());
        Fixture {
            clock,
            store,
            manager,
        }
    }

    #[tokio::test]
    async fn test_get_after_create_returns_identity() {
        let f = fixture();
        let created = f.manager.create(7, "chihiro").await.unwrap();

        let found = f.manager.get(&created.token).await.unwrap();
        assert_eq!(found.user_id, 7);
        assert_eq!(found.username, "chihiro");
        assert_eq!(found.expires_at, f.clock.now() + Duration::days(7));
    }

    #[tokio::test]
    async fn test_each_login_gets_its_own_session() {
        let f = fixture();
        let a = f.manager.create(7, "chihiro").await.unwrap();
        let b = f.manager.create(7, "chihiro").await.unwrap();

        assert_ne!(a.token, b.token);
        assert_eq!(f.manager.list_for_user(7).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_expired_session_stays_dead() {
        let f = fixture();
        let session = f.manager.create(1, "san").await.unwrap();

        f.clock.set(session.expires_at);
        assert!(f.manager.get(&session.token).await.is_none());
        assert!(f.store.peek(&session.token).await.is_none());

        f.clock.set(session.expires_at - Duration::hours(1));
        assert!(f.manager.get(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_outside_threshold_does_not_write() {
        let f = fixture();
        let session = f.manager.create(1, "san").await.unwrap();

        f.clock.advance(Duration::days(3));
        let found = f.manager.get(&session.token).await.unwrap();

        assert_eq!(found.expires_at, session.expires_at);
        assert_eq!(found.updated_at, session.updated_at);
    }

    #[tokio::test]
    async fn test_refresh_is_monotonic_under_repeated_access() {
        let f = fixture();
        let session = f.manager.create(1, "san").await.unwrap();
        f.clock.advance(Duration::days(6) + Duration::hours(1));

        let mut previous = session.expires_at;
        for _ in 0..5 {
            let found = f.manager.get(&session.token).await.unwrap();
            assert!(found.expires_at >= previous);
            previous = found.expires_at;
            f.clock.advance(Duration::minutes(10));
        }
    }

    #[tokio::test]
    async fn test_sliding_expiry_scenario() {
        let f = fixture();
        let t0 = f.clock.now();
        let session = f.manager.create(1, "san").await.unwrap();
        assert_eq!(session.expires_at, t0 + Duration::days(7));

        let t1 = t0 + Duration::days(6) + Duration::hours(1);
        f.clock.set(t1);
        let refreshed = f.manager.get(&session.token).await.unwrap();
        assert_eq!(refreshed.expires_at, t1 + Duration::days(7));

        f.clock.set(t0 + Duration::days(7) + Duration::seconds(1));
        assert!(f.manager.get(&session.token).await.is_some());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let f = fixture();
        let session = f.manager.create(1, "san").await.unwrap();

        f.manager.delete(&session.token).await;
        f.manager.delete(&session.token).await;
        f.manager.delete("never-issued").await;

        assert!(f.manager.get(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_exactly_the_expired() {
        let f = fixture();
        let old = f.manager.create(1, "san").await.unwrap();
        f.clock.advance(Duration::days(2));
        let fresh = f.manager.create(2, "ashitaka").await.unwrap();

        // `old` expires exactly now, `fresh` has two days left
        f.clock.set(old.expires_at);
        assert_eq!(f.manager.sweep().await.unwrap(), 1);

        assert!(f.store.peek(&old.token).await.is_none());
        assert_eq!(f.store.peek(&fresh.token).await, Some(fresh));
    }

    #[tokio::test]
    async fn test_delete_all_for_user() {
        let f = fixture();
        f.manager.create(1, "san").await.unwrap();
        f.manager.create(1, "san").await.unwrap();
        let other = f.manager.create(2, "ashitaka").await.unwrap();

        assert_eq!(f.manager.delete_all_for_user(1).await.unwrap(), 2);
        assert!(f.manager.list_for_user(1).await.unwrap().is_empty());
        assert!(f.manager.get(&other.token).await.is_some());
    }

    #[test]
    fn test_policy_validation() {
        assert!(SessionPolicy::from_secs(0, 0).is_err());
        assert!(SessionPolicy::from_secs(3600, -1).is_err());
        assert!(SessionPolicy::from_secs(3600, 7200).is_err());
        let policy = SessionPolicy::from_secs(86_400, 3600).unwrap();
        assert_eq!(policy.ttl, Duration::hours(24));
    }

    /// Store whose calls fail with a given error the first `failures` times.
    struct FlakyStore {
        inner: MemorySessionStore,
        failures: u32,
        calls: AtomicU32,
        transient: bool,
    }

    impl FlakyStore {
        fn new(failures: u32, transient: bool) -> Self {
            Self {
                inner: MemorySessionStore::new(),
                failures,
                calls: AtomicU32::new(0),
                transient,
            }
        }

        fn check(&self) -> StoreResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.transient {
                    return Err(StoreError::ConnectionReset("reset by peer".into()));
                }
                return Err(StoreError::Backend("relation does not exist".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SessionStore for FlakyStore {
        async fn insert(&self, session: &Session) -> StoreResult<()> {
            self.check()?;
            self.inner.insert(session).await
        }

        async fn touch(
            &self,
            token: &str,
            now: DateTime<Utc>,
            refresh_before: DateTime<Utc>,
            extended_until: DateTime<Utc>,
        ) -> StoreResult<Lookup> {
            self.check()?;
            self.inner
                .touch(token, now, refresh_before, extended_until)
                .await
        }

        async fn remove(&self, token: &str) -> StoreResult<bool> {
            self.check()?;
            self.inner.remove(token).await
        }

        async fn remove_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
            self.check()?;
            self.inner.remove_expired(now).await
        }

        async fn list_for_user(
            &self,
            user_id: i64,
            now: DateTime<Utc>,
        ) -> StoreResult<Vec<Session>> {
            self.check()?;
            self.inner.list_for_user(user_id, now).await
        }

        async fn remove_for_user(&self, user_id: i64) -> StoreResult<u64> {
            self.check()?;
            self.inner.remove_for_user(user_id).await
        }
    }

    fn manager_over(store: Arc<FlakyStore>) -> SessionManager {
        SessionManager::new(
            store,
            Arc::new(ManualClock::default()),
            SessionPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_failing_store_fails_closed_on_get() {
        let store = Arc::new(FlakyStore::new(u32::MAX, false));
        let manager = manager_over(store.clone());

        assert!(manager.get("some-token").await.is_none());
        // permanent failures are not retried
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_store_propagates_on_create() {
        let store = Arc::new(FlakyStore::new(u32::MAX, false));
        let manager = manager_over(store);

        let err = manager.create(1, "san").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn test_failing_store_delete_does_not_error() {
        let store = Arc::new(FlakyStore::new(u32::MAX, false));
        let manager = manager_over(store);

        manager.delete("some-token").await;
        assert!(manager.sweep().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_insert_failure_is_retried() {
        let store = Arc::new(FlakyStore::new(2, true));
        let manager = manager_over(store.clone());

        let session = manager.create(1, "san").await.unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            store.inner.peek(&session.token).await.map(|s| s.user_id),
            Some(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_sweep_failure_is_retried() {
        let store = Arc::new(FlakyStore::new(1, true));
        let manager = manager_over(store.clone());

        assert_eq!(manager.sweep().await.unwrap(), 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backend_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            backend: SessionBackend,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"backend":"redis"}"#).unwrap();
        assert_eq!(parsed.backend, SessionBackend::Redis);
    }
}
