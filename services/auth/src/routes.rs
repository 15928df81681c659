//! Authentication service routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::error::{AuthError, AuthResult};
use crate::middleware::{CurrentUser, require_auth};
use crate::models::{LoginCredentials, PublicUser};
use crate::service::{AuthService, RegisterRequest};
use crate::token::fingerprint;

/// Response for user login
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    pub session_token: String,
}

/// One entry of `GET /auth/sessions`; the token itself is never listed
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub current: bool,
}

/// Create the router for the authentication service
pub fn create_router(auth: AuthService) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/sessions", get(list_sessions))
        .route("/auth/logout-all", post(logout_all))
        .route_layer(middleware::from_fn_with_state(auth.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .merge(protected)
        .with_state(auth)
}

fn session_cookie(auth: &AuthService, token: String) -> Cookie<'static> {
    let ttl = auth.sessions().policy().ttl;
    Cookie::build((auth.cookie().name.clone(), token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(auth.cookie().secure)
        .path("/")
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

fn clear_session_cookie(auth: &AuthService, jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(auth.cookie().name.clone()).path("/"))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

pub async fn register(
    State(auth): State<AuthService>,
    Json(payload): Json<RegisterRequest>,
) -> AuthResult<impl IntoResponse> {
    let user = auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

/// User login endpoint
pub async fn login(
    State(auth): State<AuthService>,
    jar: CookieJar,
    Json(payload): Json<LoginCredentials>,
) -> AuthResult<impl IntoResponse> {
    info!("Login attempt for user: {}", payload.username);

    let outcome = auth
        .login(&payload.username, &payload.password)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let jar = jar.add(session_cookie(&auth, outcome.session.token.clone()));
    let response = LoginResponse {
        user: outcome.user,
        session_token: outcome.session.token,
    };

    Ok((jar, Json(response)))
}

/// Logout endpoint
pub async fn logout(
    State(auth): State<AuthService>,
    current: CurrentUser,
    jar: CookieJar,
) -> impl IntoResponse {
    auth.logout(&current.token).await;

    (
        clear_session_cookie(&auth, jar),
        Json(json!({ "message": "Logged out successfully" })),
    )
}

pub async fn me(current: CurrentUser) -> impl IntoResponse {
    Json(current)
}

pub async fn list_sessions(
    State(auth): State<AuthService>,
    current: CurrentUser,
) -> AuthResult<impl IntoResponse> {
    let sessions = auth
        .sessions_of(current.user_id)
        .await?
        .into_iter()
        .map(|session| SessionSummary {
            id: fingerprint(&session.token),
            created_at: session.created_at,
            expires_at: session.expires_at,
            current: session.token == current.token,
        })
        .collect::<Vec<_>>();

    Ok(Json(sessions))
}

/// Log out on every device
pub async fn logout_all(
    State(auth): State<AuthService>,
    current: CurrentUser,
    jar: CookieJar,
) -> AuthResult<impl IntoResponse> {
    let revoked = auth.logout_all(current.user_id).await?;

    Ok((
        clear_session_cookie(&auth, jar),
        Json(json!({ "revoked": revoked })),
    ))
}
