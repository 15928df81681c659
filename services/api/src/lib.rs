//! Gallery API for the Memri services
//!
//! Collections ("date memories"), photo metadata, likes and comments.
//! Sessions are resolved through the `auth` crate's middleware.

pub mod config;
pub mod error;
pub mod models;
pub mod ownership;
pub mod repositories;
pub mod routes;
pub mod state;

use std::sync::Arc;

use anyhow::Result;
use auth::password::PasswordSettings;
use auth::rate_limiter::RateLimiterConfig;
use common::RetryPolicy;
use sqlx::PgPool;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use crate::config::ApiSettings;
use crate::repositories::{PgCollectionRepository, PgPhotoRepository};

/// Wire the application state over Postgres.
pub async fn build_state(settings: &ApiSettings, pool: PgPool) -> Result<AppState> {
    let retry: RetryPolicy = settings.retry.into();

    // Password and limiter settings only apply to logins, served by the auth service
    let auth = auth::build_auth_service(
        &settings.session,
        retry,
        PasswordSettings::default(),
        RateLimiterConfig::default(),
        pool.clone(),
    )
    .await?;

    let collections = Arc::new(PgCollectionRepository::new(pool.clone()));

    Ok(AppState {
        auth,
        collections: collections.clone(),
        photos: Arc::new(PgPhotoRepository::new(pool)),
        owners: collections,
        retry,
    })
}
