//! In-process session store
//!
//! Suitable for single-instance deployments and tests. Every operation
//! holds the map lock for its whole duration, which makes `touch` atomic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::StoreResult;
use tokio::sync::Mutex;

use super::store::{Lookup, SessionStore};
use crate::models::Session;

#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, live or not.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Raw record, bypassing expiry handling.
    pub async fn peek(&self, token: &str) -> Option<Session> {
        self.sessions.lock().await.get(token).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &Session) -> StoreResult<()> {
        self.sessions
            .lock()
            .await
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn touch(
        &self,
        token: &str,
        now: DateTime<Utc>,
        refresh_before: DateTime<Utc>,
        extended_until: DateTime<Utc>,
    ) -> StoreResult<Lookup> {
        let mut sessions = self.sessions.lock().await;

        let Some(session) = sessions.get_mut(token) else {
            return Ok(Lookup::Missing);
        };

        if session.is_expired_at(now) {
            sessions.remove(token);
            return Ok(Lookup::Expired);
        }

        if session.expires_at < refresh_before {
            session.expires_at = session.expires_at.max(extended_until);
            session.updated_at = now;
            return Ok(Lookup::Refreshed(session.clone()));
        }

        Ok(Lookup::Active(session.clone()))
    }

    async fn remove(&self, token: &str) -> StoreResult<bool> {
        Ok(self.sessions.lock().await.remove(token).is_some())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }

    async fn list_for_user(&self, user_id: i64, now: DateTime<Utc>) -> StoreResult<Vec<Session>> {
        let sessions = self.sessions.lock().await;
        let mut found: Vec<Session> = sessions
            .values()
            .filter(|s| s.user_id == user_id && !s.is_expired_at(now))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn remove_for_user(&self, user_id: i64) -> StoreResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }
}
