//! PostgreSQL photo, like and comment repository

use async_trait::async_trait;
use common::StoreResult;
use sqlx::PgPool;
use tracing::debug;

use super::PhotoRepository;
use crate::models::{Comment, LikeState, NewComment, NewPhoto, Photo, PhotoView};

#[derive(Clone)]
pub struct PgPhotoRepository {
    pool: PgPool,
}

impl PgPhotoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhotoRepository for PgPhotoRepository {
    async fn add_photo(
        &self,
        collection_id: i64,
        uploader_id: i64,
        new: &NewPhoto,
    ) -> StoreResult<Photo> {
        let photo = sqlx::query_as::<_, Photo>(
            r#"
            INSERT INTO photos (collection_id, uploader_id, storage_key, caption)
            VALUES ($1, $2, $3, $4)
            RETURNING id, collection_id, uploader_id, storage_key, caption, created_at
            "#,
        )
        .bind(collection_id)
        .bind(uploader_id)
        .bind(new.storage_key.trim())
        .bind(&new.caption)
        .fetch_one(&self.pool)
        .await?;

        debug!("Added photo {} to collection {}", photo.id, collection_id);
        Ok(photo)
    }

    async fn find_photo(&self, id: i64) -> StoreResult<Option<Photo>> {
        let photo = sqlx::query_as::<_, Photo>(
            r#"
            SELECT id, collection_id, uploader_id, storage_key, caption, created_at
            FROM photos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(photo)
    }

    async fn list_photos(
        &self,
        collection_id: i64,
        viewer: Option<i64>,
    ) -> StoreResult<Vec<PhotoView>> {
        let photos = sqlx::query_as::<_, PhotoView>(
            r#"
            SELECT p.id, p.collection_id, p.uploader_id, p.storage_key, p.caption, p.created_at,
                   (SELECT COUNT(*) FROM photo_likes l WHERE l.photo_id = p.id) AS like_count,
                   EXISTS (
                       SELECT 1 FROM photo_likes l
                       WHERE l.photo_id = p.id AND l.user_id = $2
                   ) AS liked_by_me
            FROM photos p
            WHERE p.collection_id = $1
            ORDER BY p.created_at, p.id
            "#,
        )
        .bind(collection_id)
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }

    async fn toggle_like(&self, photo_id: i64, user_id: i64) -> StoreResult<LikeState> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM photo_likes WHERE photo_id = $1 AND user_id = $2")
            .bind(photo_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query(
                r#"
                INSERT INTO photo_likes (photo_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(photo_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        let (like_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM photo_likes WHERE photo_id = $1")
                .bind(photo_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(LikeState {
            liked: !removed,
            like_count,
        })
    }

    async fn add_comment(
        &self,
        photo_id: i64,
        author_id: i64,
        new: &NewComment,
    ) -> StoreResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO photo_comments (photo_id, author_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, photo_id, author_id, body, created_at
            "#,
        )
        .bind(photo_id)
        .bind(author_id)
        .bind(new.body.trim())
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn list_comments(&self, photo_id: i64) -> StoreResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, photo_id, author_id, body, created_at
            FROM photo_comments
            WHERE photo_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(photo_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }
}
