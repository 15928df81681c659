//! Gallery routes
//!
//! Reads are public and personalised when a session resolves; writes need a
//! session, and anything that changes a collection also needs ownership.

use auth::{CurrentUser, optional_auth, require_auth};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use common::with_retry;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    Collection, CollectionView, NewCollection, NewComment, NewPhoto, Photo, UpdateCollection,
};
use crate::ownership::authorize_owner;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOwnerRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerAdded {
    pub collection_id: i64,
    pub user_id: i64,
    /// False when the user already owned the collection
    pub added: bool,
}

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let reads = Router::new()
        .route("/collections", get(list_collections))
        .route("/collections/:id", get(get_collection))
        .route("/collections/:id/photos", get(list_photos))
        .route("/photos/:id/comments", get(list_comments))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            optional_auth,
        ));

    let writes = Router::new()
        .route("/collections", post(create_collection))
        .route(
            "/collections/:id",
            patch(update_collection).delete(delete_collection),
        )
        .route("/collections/:id/owners", post(add_owner))
        .route("/collections/:id/photos", post(add_photo))
        .route("/photos/:id/like", post(toggle_like))
        .route("/photos/:id/comments", post(add_comment))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(reads)
        .merge(writes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

async fn load_collection(state: &AppState, id: i64) -> ApiResult<Collection> {
    with_retry(&state.retry, "collection lookup", || state.collections.find(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Collection not found".to_string()))
}

async fn load_photo(state: &AppState, id: i64) -> ApiResult<Photo> {
    with_retry(&state.retry, "photo lookup", || state.photos.find_photo(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Photo not found".to_string()))
}

pub async fn list_collections(
    State(state): State<AppState>,
    viewer: Option<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let collections = with_retry(&state.retry, "collection list", || state.collections.list())
        .await?;

    let owned = match &viewer {
        Some(viewer) => {
            with_retry(&state.retry, "owned collections", || {
                state.collections.owned_by(viewer.user_id)
            })
            .await?
        }
        None => Vec::new(),
    };

    let views = collections
        .into_iter()
        .map(|collection| CollectionView {
            is_owner: owned.contains(&collection.id),
            collection,
        })
        .collect::<Vec<_>>();

    Ok(Json(views))
}

pub async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    viewer: Option<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let collection = load_collection(&state, id).await?;

    let is_owner = match &viewer {
        Some(viewer) => {
            with_retry(&state.retry, "ownership check", || {
                state.owners.is_owner(id, viewer.user_id)
            })
            .await?
        }
        None => false,
    };

    Ok(Json(CollectionView {
        collection,
        is_owner,
    }))
}

pub async fn create_collection(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<NewCollection>,
) -> ApiResult<impl IntoResponse> {
    payload.validate().map_err(ApiError::BadRequest)?;

    let collection = state.collections.create(&payload, current.user_id).await?;

    info!(
        "User {} created collection {}",
        current.user_id, collection.id
    );
    Ok((
        StatusCode::CREATED,
        Json(CollectionView {
            collection,
            is_owner: true,
        }),
    ))
}

pub async fn update_collection(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    current: CurrentUser,
    Json(payload): Json<UpdateCollection>,
) -> ApiResult<impl IntoResponse> {
    authorize_owner(
        state.collections.as_ref(),
        state.owners.as_ref(),
        &state.retry,
        id,
        current.user_id,
    )
    .await?;

    payload.validate().map_err(ApiError::BadRequest)?;
    if payload.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    let collection = with_retry(&state.retry, "collection update", || {
        state.collections.update(id, &payload)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Collection not found".to_string()))?;

    Ok(Json(CollectionView {
        collection,
        is_owner: true,
    }))
}

pub async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    current: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    authorize_owner(
        state.collections.as_ref(),
        state.owners.as_ref(),
        &state.retry,
        id,
        current.user_id,
    )
    .await?;

    with_retry(&state.retry, "collection delete", || {
        state.collections.delete(id)
    })
    .await?;

    info!("User {} deleted collection {}", current.user_id, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_owner(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    current: CurrentUser,
    Json(payload): Json<AddOwnerRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize_owner(
        state.collections.as_ref(),
        state.owners.as_ref(),
        &state.retry,
        id,
        current.user_id,
    )
    .await?;

    state
        .auth
        .find_user(payload.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let added = with_retry(&state.retry, "owner insert", || {
        state.collections.add_owner(id, payload.user_id)
    })
    .await?;

    Ok(Json(OwnerAdded {
        collection_id: id,
        user_id: payload.user_id,
        added,
    }))
}

pub async fn list_photos(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    viewer: Option<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    load_collection(&state, id).await?;

    let viewer_id = viewer.map(|v| v.user_id);
    let photos = with_retry(&state.retry, "photo list", || {
        state.photos.list_photos(id, viewer_id)
    })
    .await?;

    Ok(Json(photos))
}

pub async fn add_photo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    current: CurrentUser,
    Json(payload): Json<NewPhoto>,
) -> ApiResult<impl IntoResponse> {
    authorize_owner(
        state.collections.as_ref(),
        state.owners.as_ref(),
        &state.retry,
        id,
        current.user_id,
    )
    .await?;

    payload.validate().map_err(ApiError::BadRequest)?;

    let photo = state
        .photos
        .add_photo(id, current.user_id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(photo)))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    current: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    load_photo(&state, id).await?;

    let like = state.photos.toggle_like(id, current.user_id).await?;
    Ok(Json(like))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    load_photo(&state, id).await?;

    let comments = with_retry(&state.retry, "comment list", || {
        state.photos.list_comments(id)
    })
    .await?;

    Ok(Json(comments))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    current: CurrentUser,
    Json(payload): Json<NewComment>,
) -> ApiResult<impl IntoResponse> {
    payload.validate().map_err(ApiError::BadRequest)?;
    load_photo(&state, id).await?;

    let comment = state
        .photos
        .add_comment(id, current.user_id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}
