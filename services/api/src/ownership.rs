//! Ownership checks for collection mutations

use async_trait::async_trait;
use common::{RetryPolicy, StoreResult, with_retry};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::models::Collection;
use crate::repositories::CollectionRepository;

#[async_trait]
pub trait OwnershipGuard: Send + Sync {
    /// Whether `user_id` owns `collection_id`.
    ///
    /// False, not an error, when the collection or the ownership row does
    /// not exist; callers that need to tell the two apart check existence
    /// first, see [`authorize_owner`].
    async fn is_owner(&self, collection_id: i64, user_id: i64) -> StoreResult<bool>;
}

/// Load a collection the user is allowed to change.
///
/// Missing collection is `NotFound`; existing but not owned is `Forbidden`.
pub async fn authorize_owner(
    collections: &dyn CollectionRepository,
    guard: &dyn OwnershipGuard,
    retry: &RetryPolicy,
    collection_id: i64,
    user_id: i64,
) -> ApiResult<Collection> {
    let collection = with_retry(retry, "collection lookup", || collections.find(collection_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Collection not found".to_string()))?;

    let owner = with_retry(retry, "ownership check", || {
        guard.is_owner(collection_id, user_id)
    })
    .await?;

    if !owner {
        debug!(
            "User {} is not an owner of collection {}",
            user_id, collection_id
        );
        return Err(ApiError::Forbidden);
    }

    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCollection;
    use crate::repositories::MemoryGallery;

    fn new_collection(title: &str) -> NewCollection {
        NewCollection {
            title: title.to_string(),
            description: None,
            memory_date: None,
        }
    }

    #[tokio::test]
    async fn test_is_owner_false_for_missing_collection() {
        let gallery = MemoryGallery::new();
        assert!(!gallery.is_owner(404, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_owner_false_without_ownership_row() {
        let gallery = MemoryGallery::new();
        let c = gallery.create(&new_collection("Picnic"), 1).await.unwrap();

        assert!(gallery.is_owner(c.id, 1).await.unwrap());
        assert!(!gallery.is_owner(c.id, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_authorize_owner_distinguishes_not_found_from_forbidden() {
        let gallery = MemoryGallery::new();
        let retry = RetryPolicy::no_retry();
        let c = gallery.create(&new_collection("Picnic"), 1).await.unwrap();

        let missing = authorize_owner(&gallery, &gallery, &retry, c.id + 1, 1).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));

        let stranger = authorize_owner(&gallery, &gallery, &retry, c.id, 2).await;
        assert!(matches!(stranger, Err(ApiError::Forbidden)));

        let owner = authorize_owner(&gallery, &gallery, &retry, c.id, 1).await.unwrap();
        assert_eq!(owner.id, c.id);
    }
}
