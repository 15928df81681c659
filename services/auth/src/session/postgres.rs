//! PostgreSQL session store
//!
//! Table `sessions (token PK, user_id, username, expires_at, created_at, updated_at)`
//! with indexes on `expires_at` and `user_id`, see `sql/schema.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::StoreResult;
use sqlx::PgPool;
use tracing::debug;

use super::store::{Lookup, SessionStore};
use crate::models::Session;

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, username, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (token) DO UPDATE SET
                expires_at = GREATEST(sessions.expires_at, EXCLUDED.expires_at),
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(&session.username)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
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
        let mut tx = self.pool.begin().await?;

        // The outcome is decided on the locked row; a concurrent touch waits
        // here and then sees the committed refresh.
        let current = sqlx::query_as::<_, Session>(
            r#"
            SELECT token, user_id, username, expires_at, created_at, updated_at
            FROM sessions
            WHERE token = $1
            FOR UPDATE
            "#,
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let lookup = match current {
            None => Lookup::Missing,
            Some(session) if session.expires_at <= now => {
                sqlx::query("DELETE FROM sessions WHERE token = $1")
                    .bind(token)
                    .execute(&mut *tx)
                    .await?;
                Lookup::Expired
            }
            Some(session) if session.expires_at < refresh_before => {
                let refreshed = sqlx::query_as::<_, Session>(
                    r#"
                    UPDATE sessions
                    SET expires_at = GREATEST(expires_at, $2),
                        updated_at = $3
                    WHERE token = $1
                    RETURNING token, user_id, username, expires_at, created_at, updated_at
                    "#,
                )
                .bind(token)
                .bind(extended_until)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                Lookup::Refreshed(refreshed)
            }
            Some(session) => Lookup::Active(session),
        };

        tx.commit().await?;

        debug!("Session touch outcome: {}", lookup_name(&lookup));
        Ok(lookup)
    }

    async fn remove(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_for_user(&self, user_id: i64, now: DateTime<Utc>) -> StoreResult<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT token, user_id, username, expires_at, created_at, updated_at
            FROM sessions
            WHERE user_id = $1 AND expires_at > $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn remove_for_user(&self, user_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn lookup_name(lookup: &Lookup) -> &'static str {
    match lookup {
        Lookup::Missing => "missing",
        Lookup::Expired => "expired",
        Lookup::Active(_) => "active",
        Lookup::Refreshed(_) => "refreshed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use common::database::{DatabaseConfig, init_pool};
    use serial_test::serial;

    async fn store_with_user() -> (PgSessionStore, i64) {
        let pool = init_pool(&DatabaseConfig::from_env().unwrap())
            .await
            .unwrap();
        let username = format!("session_{}", Utc::now().timestamp_micros());
        let (user_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (username, password_hash, display_name)
            VALUES ($1, $2, 'Session test')
            RETURNING id
            "#,
        )
        .bind(&username)
        .bind("$argon2id$placeholder")
        .fetch_one(&pool)
        .await
        .unwrap();
        (PgSessionStore::new(pool), user_id)
    }

    fn session(token: &str, user_id: i64, expires_at: DateTime<Utc>) -> Session {
        let created = expires_at - Duration::days(7);
        Session {
            token: token.to_string(),
            user_id,
            username: "session test".to_string(),
            expires_at,
            created_at: created,
            updated_at: created,
        }
    }

    fn unique_token(label: &str) -> String {
        format!("{}-{}", label, Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database with sql/schema.sql applied"]
    #[serial]
    async fn test_touch_outcomes() {
        let (store, user_id) = store_with_user().await;
        let expires = t0();
        let threshold = Duration::hours(24);
        let ttl = Duration::days(7);

        let missing = store
            .touch("no-such-token", expires, expires + threshold, expires + ttl)
            .await
            .unwrap();
        assert_eq!(missing, Lookup::Missing);

        // Far from expiry: returned untouched
        let token = unique_token("active");
        store.insert(&session(&token, user_id, expires)).await.unwrap();
        let now = expires - Duration::days(3);
        match store.touch(&token, now, now + threshold, now + ttl).await.unwrap() {
            Lookup::Active(s) => assert_eq!(s.expires_at, expires),
            other => panic!("expected active, got {:?}", other),
        }

        // Inside the threshold: extended
        let now = expires - Duration::hours(23);
        match store.touch(&token, now, now + threshold, now + ttl).await.unwrap() {
            Lookup::Refreshed(s) => {
                assert_eq!(s.expires_at, now + ttl);
                assert_eq!(s.updated_at, now);
            }
            other => panic!("expected refreshed, got {:?}", other),
        }

        // A refresh target behind the stored expiry never shortens it
        let stale_now = expires - Duration::hours(1);
        let current = now + ttl;
        match store
            .touch(&token, stale_now, current + threshold, stale_now + Duration::hours(1))
            .await
            .unwrap()
        {
            Lookup::Refreshed(s) => assert_eq!(s.expires_at, current),
            other => panic!("expected refreshed, got {:?}", other),
        }

        // Past expiry: deleted, and stays gone
        let late = current + Duration::seconds(1);
        let expired = store.touch(&token, late, late + threshold, late + ttl).await.unwrap();
        assert_eq!(expired, Lookup::Expired);
        let again = store.touch(&token, late, late + threshold, late + ttl).await.unwrap();
        assert_eq!(again, Lookup::Missing);
        assert!(!store.remove(&token).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database with sql/schema.sql applied"]
    #[serial]
    async fn test_concurrent_refresh_keeps_session() {
        let (store, user_id) = store_with_user().await;
        let token = unique_token("concurrent");
        store.insert(&session(&token, user_id, t0())).await.unwrap();

        let now = t0() - Duration::hours(23);
        let refresh_before = now + Duration::hours(24);
        let extended_until = now + Duration::days(7);

        // Hold the row lock so the second touch queues behind the first
        let mut tx = store.pool.begin().await.unwrap();
        sqlx::query("SELECT 1 FROM sessions WHERE token = $1 FOR UPDATE")
            .bind(&token)
            .execute(&mut *tx)
            .await
            .unwrap();

        let first = {
            let store = store.clone();
            let token = token.clone();
            tokio::spawn(async move {
                store.touch(&token, now, refresh_before, extended_until).await
            })
        };
        let second = {
            let store = store.clone();
            let token = token.clone();
            tokio::spawn(async move {
                store.touch(&token, now, refresh_before, extended_until).await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        tx.commit().await.unwrap();

        let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
        for outcome in &outcomes {
            match outcome {
                Lookup::Refreshed(s) | Lookup::Active(s) => {
                    assert_eq!(s.expires_at, extended_until)
                }
                other => panic!("live session reported as {:?}", other),
            }
        }
        assert!(
            outcomes
                .iter()
                .any(|o| matches!(o, Lookup::Refreshed(_)))
        );

        store.remove(&token).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database with sql/schema.sql applied"]
    #[serial]
    async fn test_remove_expired_and_per_user() {
        let (store, user_id) = store_with_user().await;
        let old = unique_token("old");
        let live = unique_token("live");
        store.insert(&session(&old, user_id, t0())).await.unwrap();
        store
            .insert(&session(&live, user_id, t0() + Duration::days(30)))
            .await
            .unwrap();

        let now = t0() + Duration::seconds(1);
        assert!(store.remove_expired(now).await.unwrap() >= 1);

        let listed = store.list_for_user(user_id, now).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].token, live);

        assert_eq!(store.remove_for_user(user_id).await.unwrap(), 1);
    }
}
