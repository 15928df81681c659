//! Gallery repositories

use async_trait::async_trait;
use common::StoreResult;

use crate::models::{
    Collection, Comment, LikeState, NewCollection, NewComment, NewPhoto, Photo, PhotoView,
    UpdateCollection,
};

pub mod collection;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod photo;

pub use collection::PgCollectionRepository;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryGallery;
pub use photo::PgPhotoRepository;

#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// Insert a collection with `owner_id` as its first owner.
    async fn create(&self, new: &NewCollection, owner_id: i64) -> StoreResult<Collection>;

    async fn find(&self, id: i64) -> StoreResult<Option<Collection>>;

    /// All collections, most recent memory first.
    async fn list(&self) -> StoreResult<Vec<Collection>>;

    /// Ids of the collections a user owns.
    async fn owned_by(&self, user_id: i64) -> StoreResult<Vec<i64>>;

    async fn update(&self, id: i64, update: &UpdateCollection) -> StoreResult<Option<Collection>>;

    async fn delete(&self, id: i64) -> StoreResult<bool>;

    /// Returns false when the user already was an owner.
    async fn add_owner(&self, collection_id: i64, user_id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn add_photo(
        &self,
        collection_id: i64,
        uploader_id: i64,
        new: &NewPhoto,
    ) -> StoreResult<Photo>;

    async fn find_photo(&self, id: i64) -> StoreResult<Option<Photo>>;

    /// Photos of a collection, oldest first, with likes as seen by `viewer`.
    async fn list_photos(
        &self,
        collection_id: i64,
        viewer: Option<i64>,
    ) -> StoreResult<Vec<PhotoView>>;

    /// Like the photo if the user has not, unlike it otherwise.
    async fn toggle_like(&self, photo_id: i64, user_id: i64) -> StoreResult<LikeState>;

    async fn add_comment(
        &self,
        photo_id: i64,
        author_id: i64,
        new: &NewComment,
    ) -> StoreResult<Comment>;

    /// Comments of a photo, oldest first.
    async fn list_comments(&self, photo_id: i64) -> StoreResult<Vec<Comment>>;
}
