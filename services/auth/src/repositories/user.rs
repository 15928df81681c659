//! PostgreSQL user repository

use async_trait::async_trait;
use common::StoreResult;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{debug, info};

use super::UserRepository;
use crate::models::{NewUser, User};

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        display_name: row.get("display_name"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        debug!("Finding user by ID: {}", id);

        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, display_name, avatar_url, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_user))
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        debug!("Finding user by username: {}", username);

        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, display_name, avatar_url, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_user))
    }

    async fn create(&self, new_user: &NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", new_user.username);

        let row = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, display_name, avatar_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password_hash, display_name, avatar_url, created_at, updated_at
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.display_name)
        .bind(&new_user.avatar_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_user(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::StoreError;
    use common::database::{DatabaseConfig, init_pool};

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database with sql/schema.sql applied"]
    async fn test_create_and_find() {
        let pool = init_pool(&DatabaseConfig::from_env().unwrap())
            .await
            .unwrap();
        let repo = PgUserRepository::new(pool);
        let username = format!("user_{}", chrono::Utc::now().timestamp_micros());

        let created = repo
            .create(&NewUser {
                username: username.clone(),
                password_hash: "$argon2id$placeholder".to_string(),
                display_name: "Test".to_string(),
                avatar_url: None,
            })
            .await
            .unwrap();

        let by_name = repo.find_by_username(&username).await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        let by_id = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, username);

        let duplicate = repo
            .create(&NewUser {
                username,
                password_hash: "$argon2id$placeholder".to_string(),
                display_name: "Again".to_string(),
                avatar_url: None,
            })
            .await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
    }
}
