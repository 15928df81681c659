//! PostgreSQL collection repository

use async_trait::async_trait;
use chrono::Utc;
use common::StoreResult;
use sqlx::PgPool;
use tracing::info;

use super::CollectionRepository;
use crate::models::{Collection, NewCollection, UpdateCollection};
use crate::ownership::OwnershipGuard;

const COLUMNS: &str = "id, title, description, memory_date, created_at, updated_at";

#[derive(Clone)]
pub struct PgCollectionRepository {
    pool: PgPool,
}

impl PgCollectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionRepository for PgCollectionRepository {
    async fn create(&self, new: &NewCollection, owner_id: i64) -> StoreResult<Collection> {
        let mut tx = self.pool.begin().await?;

        let collection = sqlx::query_as::<_, Collection>(&format!(
            r#"
            INSERT INTO collections (title, description, memory_date)
            VALUES ($1, $2, $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(new.title.trim())
        .bind(new.description.as_deref().map(str::trim).filter(|d| !d.is_empty()))
        .bind(new.memory_date)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO collection_owners (collection_id, user_id) VALUES ($1, $2)")
            .bind(collection.id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Created collection {} for user {}", collection.id, owner_id);
        Ok(collection)
    }

    async fn find(&self, id: i64) -> StoreResult<Option<Collection>> {
        let collection = sqlx::query_as::<_, Collection>(&format!(
            "SELECT {COLUMNS} FROM collections WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(collection)
    }

    async fn list(&self) -> StoreResult<Vec<Collection>> {
        let collections = sqlx::query_as::<_, Collection>(&format!(
            r#"
            SELECT {COLUMNS} FROM collections
            ORDER BY memory_date DESC NULLS LAST, created_at DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(collections)
    }

    async fn owned_by(&self, user_id: i64) -> StoreResult<Vec<i64>> {
        let ids: Vec<(i64,)> =
            sqlx::query_as("SELECT collection_id FROM collection_owners WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn update(&self, id: i64, update: &UpdateCollection) -> StoreResult<Option<Collection>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Collection>(&format!(
            "SELECT {COLUMNS} FROM collections WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut collection) = current else {
            return Ok(None);
        };
        update.apply(&mut collection, Utc::now());

        let updated = sqlx::query_as::<_, Collection>(&format!(
            r#"
            UPDATE collections
            SET title = $2, description = $3, memory_date = $4, updated_at = $5
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&collection.title)
        .bind(&collection.description)
        .bind(collection.memory_date)
        .bind(collection.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_owner(&self, collection_id: i64, user_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO collection_owners (collection_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(collection_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OwnershipGuard for PgCollectionRepository {
    async fn is_owner(&self, collection_id: i64, user_id: i64) -> StoreResult<bool> {
        let (owner,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM collection_owners
                WHERE collection_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(collection_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(owner)
    }
}
