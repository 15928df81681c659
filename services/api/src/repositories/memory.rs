//! In-memory gallery used by tests and local wiring

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::StoreResult;
use tokio::sync::Mutex;

use super::{CollectionRepository, PhotoRepository};
use crate::models::{
    Collection, Comment, LikeState, NewCollection, NewComment, NewPhoto, Photo, PhotoView,
    UpdateCollection,
};
use crate::ownership::OwnershipGuard;

#[derive(Default)]
struct Gallery {
    next_id: i64,
    collections: BTreeMap<i64, Collection>,
    owners: HashSet<(i64, i64)>,
    photos: BTreeMap<i64, Photo>,
    likes: HashSet<(i64, i64)>,
    comments: BTreeMap<i64, Comment>,
}

impl Gallery {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn like_count(&self, photo_id: i64) -> i64 {
        self.likes.iter().filter(|(p, _)| *p == photo_id).count() as i64
    }
}

#[derive(Clone, Default)]
pub struct MemoryGallery {
    inner: Arc<Mutex<Gallery>>,
}

impl MemoryGallery {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CollectionRepository for MemoryGallery {
    async fn create(&self, new: &NewCollection, owner_id: i64) -> StoreResult<Collection> {
        let mut gallery = self.inner.lock().await;
        let now = Utc::now();
        let collection = Collection {
            id: gallery.next_id(),
            title: new.title.trim().to_string(),
            description: new
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            memory_date: new.memory_date,
            created_at: now,
            updated_at: now,
        };
        gallery.collections.insert(collection.id, collection.clone());
        gallery.owners.insert((collection.id, owner_id));
        Ok(collection)
    }

    async fn find(&self, id: i64) -> StoreResult<Option<Collection>> {
        Ok(self.inner.lock().await.collections.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Collection>> {
        let gallery = self.inner.lock().await;
        let mut collections: Vec<Collection> = gallery.collections.values().cloned().collect();
        // None sorts first in Option's Ord, so reversing puts undated ones last
        collections.sort_by(|a, b| {
            b.memory_date
                .cmp(&a.memory_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(collections)
    }

    async fn owned_by(&self, user_id: i64) -> StoreResult<Vec<i64>> {
        let gallery = self.inner.lock().await;
        let mut ids: Vec<i64> = gallery
            .owners
            .iter()
            .filter(|(_, owner)| *owner == user_id)
            .map(|(collection, _)| *collection)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn update(&self, id: i64, update: &UpdateCollection) -> StoreResult<Option<Collection>> {
        let mut gallery = self.inner.lock().await;
        Ok(gallery.collections.get_mut(&id).map(|collection| {
            update.apply(collection, Utc::now());
            collection.clone()
        }))
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let mut gallery = self.inner.lock().await;
        if gallery.collections.remove(&id).is_none() {
            return Ok(false);
        }

        gallery.owners.retain(|(collection, _)| *collection != id);
        let photo_ids: HashSet<i64> = gallery
            .photos
            .values()
            .filter(|p| p.collection_id == id)
            .map(|p| p.id)
            .collect();
        gallery.photos.retain(|pid, _| !photo_ids.contains(pid));
        gallery.likes.retain(|(pid, _)| !photo_ids.contains(pid));
        gallery.comments.retain(|_, c| !photo_ids.contains(&c.photo_id));
        Ok(true)
    }

    async fn add_owner(&self, collection_id: i64, user_id: i64) -> StoreResult<bool> {
        Ok(self.inner.lock().await.owners.insert((collection_id, user_id)))
    }
}

#[async_trait]
impl OwnershipGuard for MemoryGallery {
    async fn is_owner(&self, collection_id: i64, user_id: i64) -> StoreResult<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .owners
            .contains(&(collection_id, user_id)))
    }
}

#[async_trait]
impl PhotoRepository for MemoryGallery {
    async fn add_photo(
        &self,
        collection_id: i64,
        uploader_id: i64,
        new: &NewPhoto,
    ) -> StoreResult<Photo> {
        let mut gallery = self.inner.lock().await;
        let photo = Photo {
            id: gallery.next_id(),
            collection_id,
            uploader_id,
            storage_key: new.storage_key.trim().to_string(),
            caption: new.caption.clone(),
            created_at: Utc::now(),
        };
        gallery.photos.insert(photo.id, photo.clone());
        Ok(photo)
    }

    async fn find_photo(&self, id: i64) -> StoreResult<Option<Photo>> {
        Ok(self.inner.lock().await.photos.get(&id).cloned())
    }

    async fn list_photos(
        &self,
        collection_id: i64,
        viewer: Option<i64>,
    ) -> StoreResult<Vec<PhotoView>> {
        let gallery = self.inner.lock().await;
        Ok(gallery
            .photos
            .values()
            .filter(|p| p.collection_id == collection_id)
            .map(|p| PhotoView {
                like_count: gallery.like_count(p.id),
                liked_by_me: viewer.is_some_and(|v| gallery.likes.contains(&(p.id, v))),
                photo: p.clone(),
            })
            .collect())
    }

    async fn toggle_like(&self, photo_id: i64, user_id: i64) -> StoreResult<LikeState> {
        let mut gallery = self.inner.lock().await;
        let liked = if gallery.likes.remove(&(photo_id, user_id)) {
            false
        } else {
            gallery.likes.insert((photo_id, user_id));
            true
        };
        Ok(LikeState {
            liked,
            like_count: gallery.like_count(photo_id),
        })
    }

    async fn add_comment(
        &self,
        photo_id: i64,
        author_id: i64,
        new: &NewComment,
    ) -> StoreResult<Comment> {
        let mut gallery = self.inner.lock().await;
        let comment = Comment {
            id: gallery.next_id(),
            photo_id,
            author_id,
            body: new.body.trim().to_string(),
            created_at: Utc::now(),
        };
        gallery.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, photo_id: i64) -> StoreResult<Vec<Comment>> {
        let gallery = self.inner.lock().await;
        Ok(gallery
            .comments
            .values()
            .filter(|c| c.photo_id == photo_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn new_collection(title: &str, date: Option<NaiveDate>) -> NewCollection {
        NewCollection {
            title: title.to_string(),
            description: None,
            memory_date: date,
        }
    }

    #[tokio::test]
    async fn test_list_orders_by_memory_date() {
        let gallery = MemoryGallery::new();
        let undated = gallery.create(&new_collection("Undated", None), 1).await.unwrap();
        let old = gallery
            .create(&new_collection("Old", NaiveDate::from_ymd_opt(2020, 5, 1)), 1)
            .await
            .unwrap();
        let recent = gallery
            .create(&new_collection("Recent", NaiveDate::from_ymd_opt(2024, 5, 1)), 1)
            .await
            .unwrap();

        let ids: Vec<i64> = gallery.list().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![recent.id, old.id, undated.id]);
    }

    #[tokio::test]
    async fn test_toggle_like_flips() {
        let gallery = MemoryGallery::new();
        let c = gallery.create(&new_collection("Picnic", None), 1).await.unwrap();
        let photo = gallery
            .add_photo(
                c.id,
                1,
                &NewPhoto {
                    storage_key: "picnic/1.jpg".into(),
                    caption: None,
                },
            )
            .await
            .unwrap();

        let first = gallery.toggle_like(photo.id, 2).await.unwrap();
        assert_eq!(first, LikeState { liked: true, like_count: 1 });

        gallery.toggle_like(photo.id, 3).await.unwrap();
        let views = gallery.list_photos(c.id, Some(2)).await.unwrap();
        assert_eq!(views[0].like_count, 2);
        assert!(views[0].liked_by_me);

        let undone = gallery.toggle_like(photo.id, 2).await.unwrap();
        assert_eq!(undone, LikeState { liked: false, like_count: 1 });
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let gallery = MemoryGallery::new();
        let c = gallery.create(&new_collection("Picnic", None), 1).await.unwrap();
        let photo = gallery
            .add_photo(
                c.id,
                1,
                &NewPhoto {
                    storage_key: "picnic/1.jpg".into(),
                    caption: None,
                },
            )
            .await
            .unwrap();
        gallery
            .add_comment(photo.id, 2, &NewComment { body: "nice".into() })
            .await
            .unwrap();

        assert!(gallery.delete(c.id).await.unwrap());
        assert!(!gallery.delete(c.id).await.unwrap());
        assert!(gallery.find_photo(photo.id).await.unwrap().is_none());
        assert!(gallery.list_comments(photo.id).await.unwrap().is_empty());
        assert!(!gallery.is_owner(c.id, 1).await.unwrap());
    }
}
