//! Session authentication middleware
//!
//! Tokens come from `Authorization: Bearer <token>` or, failing that, the
//! session cookie. [`require_auth`] rejects requests it cannot resolve;
//! [`optional_auth`] lets them through without an identity. Handlers read
//! the identity with the [`CurrentUser`] extractor.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{Authorization, HeaderMapExt, authorization::Bearer},
};
use serde::Serialize;
use tracing::debug;

use crate::error::AuthError;
use crate::models::PublicUser;
use crate::service::AuthService;
use crate::token::fingerprint;

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
    pub user: PublicUser,
    #[serde(skip)]
    pub token: String,
}

/// Pull the session token from the request. The header wins over the cookie.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_header = headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().trim().to_string())
        .filter(|token| !token.is_empty());

    if from_header.is_some() {
        return from_header;
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Reject requests without a live session.
pub async fn require_auth(
    State(auth): State<AuthService>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token =
        extract_token(req.headers(), &auth.cookie().name).ok_or(AuthError::Unauthenticated)?;

    let current = auth.resolve(&token).await?;
    req.extensions_mut().insert(current);

    Ok(next.run(req).await)
}

/// Attach an identity when one resolves, continue either way.
pub async fn optional_auth(
    State(auth): State<AuthService>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(req.headers(), &auth.cookie().name) {
        match auth.resolve(&token).await {
            Ok(current) => {
                req.extensions_mut().insert(current);
            }
            Err(e) => debug!(
                "Continuing without identity for {}: {}",
                fingerprint(&token),
                e
            ),
        }
    }

    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{
        HeaderValue,
        header::{AUTHORIZATION, COOKIE},
    };

    #[test]
    fn test_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token(&headers, "memri_session").as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cookie_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; memri_session=from-cookie"),
        );
        assert_eq!(
            extract_token(&headers, "memri_session").as_deref(),
            Some("from-cookie")
        );
        assert_eq!(extract_token(&headers, "other"), None);
    }

    #[test]
    fn test_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("memri_session=from-cookie"));
        assert_eq!(
            extract_token(&headers, "memri_session").as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn test_non_bearer_scheme_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&headers, "memri_session"), None);

        headers.insert(COOKIE, HeaderValue::from_static("memri_session=c"));
        assert_eq!(extract_token(&headers, "memri_session").as_deref(), Some("c"));
    }

    #[test]
    fn test_empty_bearer_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_token(&headers, "memri_session"), None);
    }
}
