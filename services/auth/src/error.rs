//! Error type for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::password::CredentialError;

#[derive(Error, Debug)]
pub enum AuthError {
    /// No token on a route that needs one, or the account behind it is gone
    #[error("Authentication required")]
    Unauthenticated,

    /// Token present but unknown or expired
    #[error("Session is invalid or has expired")]
    InvalidSession,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Too many attempts, try again later")]
    RateLimited,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Internal server error")]
    Internal(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated
            | AuthError::InvalidSession
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Store(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Store(_) | AuthError::Credential(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::InvalidSession => "invalid_session",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::RateLimited => "rate_limited",
            AuthError::Validation(_) => "validation_failed",
            AuthError::Conflict(_) => "conflict",
            AuthError::Store(e) => e.kind().code(),
            AuthError::Credential(_) | AuthError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side details stay in the logs
        let message = match &self {
            AuthError::Store(e) => {
                error!("Store failure: {}", e);
                if e.is_transient() {
                    "Service temporarily unavailable".to_string()
                } else {
                    "Internal server error".to_string()
                }
            }
            AuthError::Credential(e) => {
                error!("Credential failure: {}", e);
                "Internal server error".to_string()
            }
            AuthError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
