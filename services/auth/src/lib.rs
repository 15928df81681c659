//! Authentication for the Memri services
//!
//! Password verification, the session lifecycle with its storage backends,
//! the axum middleware that resolves a request to an identity, and the
//! `/auth/*` routes. The api service links this crate for its middleware.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod password;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod session;
pub mod sweeper;
pub mod token;
pub mod validation;

use std::sync::Arc;

use anyhow::Result;
use common::{RetryPolicy, SystemClock, cache::{RedisConfig, RedisPool}};
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use error::{AuthError, AuthResult};
pub use middleware::{CurrentUser, extract_token, optional_auth, require_auth};
pub use service::AuthService;

use crate::config::SessionSettings;
use crate::password::{CredentialVerifier, PasswordSettings};
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::repositories::PgUserRepository;
use crate::service::CookieSettings;
use crate::session::{
    MemorySessionStore, PgSessionStore, RedisSessionStore, SessionBackend, SessionManager,
    SessionStore,
};

/// Install the global tracing subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Open the configured session backend.
pub async fn open_session_store(
    backend: SessionBackend,
    pool: &PgPool,
) -> Result<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match backend {
        SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
        SessionBackend::Postgres => Arc::new(PgSessionStore::new(pool.clone())),
        SessionBackend::Redis => {
            let redis = RedisPool::new(&RedisConfig::from_env()?).await?;
            if !redis.health_check().await? {
                anyhow::bail!("Redis did not answer PING");
            }
            Arc::new(RedisSessionStore::new(redis))
        }
    };

    info!("Using {:?} session store", backend);
    Ok(store)
}

/// Wire an [`AuthService`] over Postgres accounts and the configured session store.
pub async fn build_auth_service(
    session: &SessionSettings,
    retry: RetryPolicy,
    password: PasswordSettings,
    login_limit: RateLimiterConfig,
    pool: PgPool,
) -> Result<AuthService> {
    let store = open_session_store(session.backend, &pool).await?;
    let sessions =
        SessionManager::new(store, Arc::new(SystemClock), session.policy()?).with_retry(retry);

    let service = AuthService::new(
        sessions,
        Arc::new(PgUserRepository::new(pool)),
        CredentialVerifier::new(password)?,
        RateLimiter::new(login_limit),
        CookieSettings {
            name: session.cookie_name.clone(),
            secure: session.secure_cookie,
        },
    )
    .with_retry(retry);

    Ok(service)
}
