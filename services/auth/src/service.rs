//! Login, registration and session resolution

use std::sync::Arc;

use common::{RetryPolicy, StoreError, with_retry};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};
use crate::middleware::CurrentUser;
use crate::models::{NewUser, PublicUser, Session, User};
use crate::password::CredentialVerifier;
use crate::rate_limiter::RateLimiter;
use crate::repositories::UserRepository;
use crate::session::SessionManager;
use crate::validation::{
    validate_avatar_url, validate_display_name, validate_password, validate_username,
};

/// Session cookie attributes
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub session: Session,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    sessions: SessionManager,
    users: Arc<dyn UserRepository>,
    verifier: CredentialVerifier,
    limiter: RateLimiter,
    cookie: CookieSettings,
    retry: RetryPolicy,
}

impl AuthService {
    pub fn new(
        sessions: SessionManager,
        users: Arc<dyn UserRepository>,
        verifier: CredentialVerifier,
        limiter: RateLimiter,
        cookie: CookieSettings,
    ) -> Self {
        Self {
            sessions,
            users,
            verifier,
            limiter,
            cookie,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn cookie(&self) -> &CookieSettings {
        &self.cookie
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Look up an account, for services that reference users by id.
    pub async fn find_user(&self, id: i64) -> AuthResult<Option<PublicUser>> {
        Ok(self.find_user_by_id(id).await?.map(PublicUser::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        with_retry(&self.retry, "user lookup", || {
            self.users.find_by_username(username)
        })
        .await
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        with_retry(&self.retry, "user lookup", || self.users.find_by_id(id)).await
    }

    /// Check credentials and open a session.
    ///
    /// A wrong password or an unknown username is `Ok(None)`. Failing to
    /// store the session is an error, never a silent success.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<Option<LoginOutcome>> {
        let limiter_key = username.to_lowercase();
        if !self.limiter.is_allowed(&limiter_key).await {
            warn!("Login for {} refused, rate limited", username);
            return Err(AuthError::RateLimited);
        }

        let user = self.find_user_by_username(username).await?;

        let verifier = self.verifier.clone();
        let password = password.to_string();
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => verifier.verify(&password, &hash),
            None => Ok(verifier.verify_dummy(&password)),
        })
        .await
        .map_err(|e| AuthError::Internal(format!("password verification task failed: {}", e)))??;

        let user = match user {
            Some(user) if verified => user,
            _ => {
                info!("Failed login for {}", username);
                self.limiter.record_failure(&limiter_key).await;
                return Ok(None);
            }
        };

        let session = self.sessions.create(user.id, &user.username).await?;
        self.limiter.reset(&limiter_key).await;

        info!("User {} logged in", user.id);
        Ok(Some(LoginOutcome {
            user: PublicUser::from(user),
            session,
        }))
    }

    /// Create an account.
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<PublicUser> {
        validate_username(&request.username).map_err(AuthError::Validation)?;
        validate_password(&request.password).map_err(AuthError::Validation)?;
        validate_display_name(&request.display_name).map_err(AuthError::Validation)?;
        if let Some(url) = &request.avatar_url {
            validate_avatar_url(url).map_err(AuthError::Validation)?;
        }

        let verifier = self.verifier.clone();
        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {}", e)))??;

        let new_user = NewUser {
            username: request.username,
            password_hash,
            display_name: request.display_name.trim().to_string(),
            avatar_url: request.avatar_url,
        };

        // Not retried: a retry after a lost acknowledgement would report a conflict
        let user = self.users.create(&new_user).await.map_err(|e| match e {
            StoreError::Conflict(_) => {
                AuthError::Conflict("Username is already taken".to_string())
            }
            other => AuthError::Store(other),
        })?;

        info!("Registered user {} ({})", user.id, user.username);
        Ok(PublicUser::from(user))
    }

    /// Resolve a token to the identity behind it.
    pub async fn resolve(&self, token: &str) -> AuthResult<CurrentUser> {
        let session = self
            .sessions
            .get(token)
            .await
            .ok_or(AuthError::InvalidSession)?;

        let user = self
            .find_user_by_id(session.user_id)
            .await?
            .ok_or_else(|| {
                warn!(
                    "Session for user {} outlived the account",
                    session.user_id
                );
                AuthError::Unauthenticated
            })?;

        Ok(CurrentUser {
            user_id: session.user_id,
            username: session.username,
            user: PublicUser::from(user),
            token: session.token,
        })
    }

    pub async fn logout(&self, token: &str) {
        self.sessions.delete(token).await;
    }

    pub async fn logout_all(&self, user_id: i64) -> AuthResult<u64> {
        Ok(self.sessions.delete_all_for_user(user_id).await?)
    }

    pub async fn sessions_of(&self, user_id: i64) -> AuthResult<Vec<Session>> {
        Ok(self.sessions.list_for_user(user_id).await?)
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! Fully in-memory service wiring

    use std::sync::Arc;

    use common::{ManualClock, RetryPolicy};

    use super::{AuthService, CookieSettings};
    use crate::password::{CredentialVerifier, PasswordSettings};
    use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
    use crate::repositories::MemoryUserRepository;
    use crate::session::{MemorySessionStore, SessionManager, SessionPolicy};

    pub struct TestAuth {
        pub service: AuthService,
        pub clock: Arc<ManualClock>,
        pub users: MemoryUserRepository,
        pub store: MemorySessionStore,
    }

    pub fn memory_auth_service() -> TestAuth {
        let clock = Arc::new(ManualClock::default());
        let users = MemoryUserRepository::new();
        let store = MemorySessionStore::new();
        let sessions = SessionManager::new(
            Arc::new(store.clone()),
            clock.clone(),
            SessionPolicy::default(),
        )
        .with_retry(RetryPolicy::no_retry());

        let verifier = CredentialVerifier::new(PasswordSettings::cheap())
            .expect("cheap argon2 parameters are valid");

        let service = AuthService::new(
            sessions,
            Arc::new(users.clone()),
            verifier,
            RateLimiter::new(RateLimiterConfig::default()),
            CookieSettings {
                name: "memri_session".to_string(),
                secure: false,
            },
        )
        .with_retry(RetryPolicy::no_retry());

        TestAuth {
            service,
            clock,
            users,
            store,
        }
    }
}
