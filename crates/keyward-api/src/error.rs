//! API error handling
//!
//! The only place engine outcomes become HTTP statuses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyward_core::AuthError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

fn auth_status(err: &AuthError) -> (StatusCode, &'static str) {
    match err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
        AuthError::MalformedOrBadSignature => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
        AuthError::Expired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
        AuthError::Revoked => (StatusCode::UNAUTHORIZED, "TOKEN_REVOKED"),
        AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        AuthError::PermissionDenied => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        AuthError::UserNotFound | AuthError::RoleNotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        AuthError::DuplicateName(_) => (StatusCode::BAD_REQUEST, "DUPLICATE_NAME"),
        AuthError::Conflict(_) => (StatusCode::BAD_REQUEST, "CONFLICT"),
        AuthError::Validation(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        AuthError::Transport(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        AuthError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(err) => auth_status(err).0,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            AppError::Auth(err @ (AuthError::Transport(_) | AuthError::Crypto(_))) => {
                // Driver and hashing details stay in the logs
                tracing::error!(error = %err, "request failed");
                let (status, code) = auth_status(err);
                let message = if status == StatusCode::SERVICE_UNAVAILABLE {
                    "Backing service unavailable"
                } else {
                    "Internal server error"
                };
                (status, ApiError::new(code, message))
            }
            AppError::Auth(err) => {
                let (status, code) = auth_status(err);
                (status, ApiError::new(code, err.to_string()))
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("BAD_REQUEST", "Invalid request").with_details(msg.clone()),
            ),
        };

        (status, Json(error)).into_response()
    }
}
