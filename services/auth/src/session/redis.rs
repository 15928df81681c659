//! Redis session store
//!
//! Key patterns:
//! - `session:{token}`: session JSON, with a Redis TTL matching `expires_at`
//! - `user_sessions:{user_id}`: set of tokens belonging to a user
//!
//! Reads that may write (touch, remove) run as Lua scripts so each one is
//! a single atomic step on the server. The scripts derive the user set key
//! from the stored record, so this store targets a single Redis node.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{StoreError, StoreResult, cache::RedisPool};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::{Lookup, SessionStore};
use crate::models::Session;

const TOUCH_SCRIPT: &str = r"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return {'missing'}
end
local s = cjson.decode(raw)
local now = tonumber(ARGV[1])
if s.expires_at_ms <= now then
    redis.call('DEL', KEYS[1])
    redis.call('SREM', 'user_sessions:' .. s.user_id, s.token)
    return {'expired'}
end
if s.expires_at_ms < tonumber(ARGV[2]) then
    local extended = tonumber(ARGV[3])
    if extended > s.expires_at_ms then
        s.expires_at_ms = extended
    end
    s.updated_at_ms = now
    raw = cjson.encode(s)
    redis.call('SET', KEYS[1], raw, 'PX', s.expires_at_ms - now)
    return {'refreshed', raw}
end
return {'active', raw}
";

const REMOVE_SCRIPT: &str = r"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return 0
end
local s = cjson.decode(raw)
if ARGV[1] and s.expires_at_ms > tonumber(ARGV[1]) then
    return 0
end
redis.call('DEL', KEYS[1])
redis.call('SREM', 'user_sessions:' .. s.user_id, s.token)
return 1
";

/// Session as stored in Redis, timestamps in Unix milliseconds so the Lua
/// scripts can compare them.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token: String,
    user_id: i64,
    username: String,
    expires_at_ms: i64,
    created_at_ms: i64,
    updated_at_ms: i64,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            user_id: session.user_id,
            username: session.username.clone(),
            expires_at_ms: session.expires_at.timestamp_millis(),
            created_at_ms: session.created_at.timestamp_millis(),
            updated_at_ms: session.updated_at.timestamp_millis(),
        }
    }
}

impl TryFrom<StoredSession> for Session {
    type Error = StoreError;

    fn try_from(stored: StoredSession) -> Result<Self, Self::Error> {
        let ts = |ms: i64| {
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", ms)))
        };

        Ok(Session {
            expires_at: ts(stored.expires_at_ms)?,
            created_at: ts(stored.created_at_ms)?,
            updated_at: ts(stored.updated_at_ms)?,
            token: stored.token,
            user_id: stored.user_id,
            username: stored.username,
        })
    }
}

fn decode(raw: &str) -> StoreResult<Session> {
    let stored: StoredSession =
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Session::try_from(stored)
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

fn user_sessions_key(user_id: i64) -> String {
    format!("user_sessions:{}", user_id)
}

#[derive(Clone)]
pub struct RedisSessionStore {
    redis: RedisPool,
}

impl RedisSessionStore {
    pub fn new(redis: RedisPool) -> Self {
        Self { redis }
    }

    /// Iterate keys matching `pattern` with SCAN, which does not block the server.
    async fn scan_keys<C>(con: &mut C, pattern: &str) -> StoreResult<Vec<String>>
    where
        C: redis::aio::ConnectionLike + Send,
    {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(con)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn insert(&self, session: &Session) -> StoreResult<()> {
        let mut con = self.redis.connection().await?;
        let json = serde_json::to_string(&StoredSession::from(session))
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let ttl_ms = (session.expires_at - session.updated_at)
            .num_milliseconds()
            .max(1);

        let _: () = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(session_key(&session.token))
            .arg(json)
            .arg("PX")
            .arg(ttl_ms)
            .ignore()
            .cmd("SADD")
            .arg(user_sessions_key(session.user_id))
            .arg(&session.token)
            .ignore()
            .query_async(&mut con)
            .await?;

        Ok(())
    }

    async fn touch(
        &self,
        token: &str,
        now: DateTime<Utc>,
        refresh_before: DateTime<Utc>,
        extended_until: DateTime<Utc>,
    ) -> StoreResult<Lookup> {
        let mut con = self.redis.connection().await?;
        let reply: Vec<String> = redis::Script::new(TOUCH_SCRIPT)
            .key(session_key(token))
            .arg(now.timestamp_millis())
            .arg(refresh_before.timestamp_millis())
            .arg(extended_until.timestamp_millis())
            .invoke_async(&mut con)
            .await?;

        let lookup = match (reply.first().map(String::as_str), reply.get(1)) {
            (Some("expired"), _) => Lookup::Expired,
            (Some("refreshed"), Some(raw)) => Lookup::Refreshed(decode(raw)?),
            (Some("active"), Some(raw)) => Lookup::Active(decode(raw)?),
            (Some("missing"), _) => Lookup::Missing,
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "unexpected touch reply: {:?}",
                    reply.first()
                )));
            }
        };

        Ok(lookup)
    }

    async fn remove(&self, token: &str) -> StoreResult<bool> {
        let mut con = self.redis.connection().await?;
        let removed: i64 = redis::Script::new(REMOVE_SCRIPT)
            .key(session_key(token))
            .invoke_async(&mut con)
            .await?;

        Ok(removed > 0)
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut con = self.redis.connection().await?;
        let script = redis::Script::new(REMOVE_SCRIPT);
        let mut removed = 0u64;

        for key in Self::scan_keys(&mut con, "session:*").await? {
            let n: i64 = script
                .key(&key)
                .arg(now.timestamp_millis())
                .invoke_async(&mut con)
                .await?;
            removed += n.max(0) as u64;
        }

        // Tokens whose key Redis already expired on its own still sit in
        // the per-user sets.
        for set_key in Self::scan_keys(&mut con, "user_sessions:*").await? {
            let tokens: Vec<String> = con.smembers(&set_key).await?;
            for token in tokens {
                let exists: bool = con.exists(session_key(&token)).await?;
                if !exists {
                    let _: () = con.srem(&set_key, &token).await?;
                }
            }
        }

        debug!("Redis sweep removed {} sessions", removed);
        Ok(removed)
    }

    async fn list_for_user(&self, user_id: i64, now: DateTime<Utc>) -> StoreResult<Vec<Session>> {
        let mut con = self.redis.connection().await?;
        let tokens: Vec<String> = con.smembers(user_sessions_key(user_id)).await?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = tokens.iter().map(|t| session_key(t)).collect();
        let raws: Vec<Option<String>> = con.mget(&keys).await?;

        let mut sessions = Vec::with_capacity(raws.len());
        for raw in raws.into_iter().flatten() {
            let session = decode(&raw)?;
            if !session.is_expired_at(now) {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn remove_for_user(&self, user_id: i64) -> StoreResult<u64> {
        let mut con = self.redis.connection().await?;
        let set_key = user_sessions_key(user_id);
        let tokens: Vec<String> = con.smembers(&set_key).await?;

        let mut removed = 0u64;
        for token in &tokens {
            let n: u64 = con.del(session_key(token)).await?;
            removed += n;
        }
        let _: () = con.del(&set_key).await?;

        Ok(removed)
    }
}
