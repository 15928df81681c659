//! Storage port for sessions
//!
//! A [`SessionStore`] persists [`Session`] records keyed by token. The
//! [`SessionManager`](super::SessionManager) owns the expiry policy; stores
//! only apply the cut-off instants it hands them, each call as a single
//! atomic operation on the backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::StoreResult;

use crate::models::Session;

/// Outcome of [`SessionStore::touch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// No record under that token.
    Missing,
    /// A record existed but was past `expires_at`; it has been deleted.
    Expired,
    /// Live record, left unchanged.
    Active(Session),
    /// Live record whose expiry was pushed forward.
    Refreshed(Session),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session. Inserting the same token twice with the same
    /// record must succeed, so a retried insert is harmless.
    async fn insert(&self, session: &Session) -> StoreResult<()>;

    /// Read a session and conditionally extend it, atomically.
    ///
    /// - record missing: [`Lookup::Missing`]
    /// - `expires_at <= now`: delete it, [`Lookup::Expired`]
    /// - `expires_at < refresh_before`: set `expires_at = max(expires_at, extended_until)`
    ///   and `updated_at = now`, [`Lookup::Refreshed`]
    /// - otherwise [`Lookup::Active`]
    async fn touch(
        &self,
        token: &str,
        now: DateTime<Utc>,
        refresh_before: DateTime<Utc>,
        extended_until: DateTime<Utc>,
    ) -> StoreResult<Lookup>;

    /// Delete one session. Returns whether a record was removed.
    async fn remove(&self, token: &str) -> StoreResult<bool>;

    /// Delete every session with `expires_at <= now`.
    async fn remove_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Live sessions of one user, newest first.
    async fn list_for_user(&self, user_id: i64, now: DateTime<Utc>) -> StoreResult<Vec<Session>>;

    /// Delete every session of one user.
    async fn remove_for_user(&self, user_id: i64) -> StoreResult<u64>;
}
