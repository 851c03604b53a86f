//! Authentication API handlers
//!
//! Signup, sign-in, token checks, rotation, logout and login history.

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::{ApiError, AppError};
use crate::middleware::CurrentIdentity;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use keyward_core::{AuthError, LoginRecord, NewUser, TokenClaims, TokenPair, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 255, message = "Login is required"))]
    pub login: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Sign-in request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SigninRequest {
    #[validate(length(min = 1, message = "Login is required"))]
    pub login: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// A single token, for check, refresh and logout
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TokenRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub login: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            login: user.login,
            first_name: user.first_name,
            last_name: user.last_name,
            is_superuser: user.is_superuser,
            roles: user.roles,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Decoded claims of a valid token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClaimsResponse {
    pub user: String,
    pub roles: Vec<String>,
    pub jti: String,
    pub expire: DateTime<Utc>,
}

impl From<TokenClaims> for ClaimsResponse {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user: claims.user,
            roles: claims.roles,
            jti: claims.jti,
            expire: claims.expire,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Login whose history is requested
    pub login: String,
    /// 1-based page number (default 1)
    pub page_number: Option<u32>,
    /// Page size, clamped to the configured range (default 50)
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SigninRecordResponse {
    pub login_at: DateTime<Utc>,
    pub signin_data: Option<String>,
}

impl From<LoginRecord> for SigninRecordResponse {
    fn from(record: LoginRecord) -> Self {
        Self {
            login_at: record.login_at,
            signin_data: record.signin_data,
        }
    }
}

/// Register a new user account
///
/// New users carry no roles and no superuser flag.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid input or login taken", body = ApiError),
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let ip_address = extract_ip_address(&headers);

    let new_user = NewUser {
        login: request.login.clone(),
        password: request.password,
        first_name: request.first_name,
        last_name: request.last_name,
    };

    match state.engine.signup(new_user).await {
        Ok(user) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: user.id,
                login: user.login.clone(),
                ip_address,
            });
            Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
        }
        Err(err) => {
            audit_log(&AuditEvent::RegistrationFailure {
                login: request.login,
                reason: err.to_string(),
                ip_address,
            });
            Err(err.into())
        }
    }
}

/// Sign in with login and password
///
/// Returns an access/refresh pair and records the login event. The
/// request's User-Agent is stored as sign-in data.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signin",
    tag = "auth",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 401, description = "Invalid login or password", body = ApiError),
    )
)]
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SigninRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);

    match state
        .engine
        .authenticate(&request.login, &request.password, user_agent.clone())
        .await
    {
        Ok(pair) => {
            audit_log(&AuditEvent::LoginSuccess {
                login: request.login,
                ip_address,
                user_agent,
            });
            Ok(Json(TokenResponse::from(pair)))
        }
        Err(err) => {
            audit_log(&AuditEvent::LoginFailure {
                login: request.login,
                reason: err.to_string(),
                ip_address,
                user_agent,
            });
            Err(err.into())
        }
    }
}

/// Validate a token and return its claims
#[utoipa::path(
    post,
    path = "/api/v1/auth/check_token",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token is valid", body = ClaimsResponse),
        (status = 401, description = "Malformed, expired or revoked", body = ApiError),
    )
)]
pub async fn check_token_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let claims = state.engine.check_token(&request.token).await?;
    Ok(Json(ClaimsResponse::from(claims)))
}

/// Exchange a valid token for a new pair
///
/// The presented token is not revoked by rotation.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "New pair issued", body = TokenResponse),
        (status = 401, description = "Malformed, expired or revoked", body = ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let pair = state.engine.refresh(&request.token).await?;

    audit_log(&AuditEvent::TokenRefresh {
        ip_address: extract_ip_address(&headers),
        user_agent: extract_user_agent(&headers),
    });
    Ok(Json(TokenResponse::from(pair)))
}

/// Revoke a token (logout)
///
/// Both tokens of the pair share an identifier, so revoking either blocks
/// both.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token revoked", body = MessageResponse),
        (status = 401, description = "Malformed token", body = ApiError),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let claims = state.engine.revoke(&request.token).await?;

    audit_log(&AuditEvent::Logout {
        login: claims.user,
        jti: claims.jti,
        ip_address: extract_ip_address(&headers),
    });
    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Login history, most recent first
#[utoipa::path(
    get,
    path = "/api/v1/auth/signin_history",
    tag = "auth",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Login events", body = [SigninRecordResponse]),
        (status = 400, description = "Invalid page number", body = ApiError),
        (status = 404, description = "Unknown login", body = ApiError),
    )
)]
pub async fn signin_history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let records = state
        .engine
        .history(&query.login, query.page_number.unwrap_or(1), query.page_size)
        .await?;

    let body: Vec<SigninRecordResponse> = records.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Current user profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let identity = identity.get().ok_or(AuthError::Unauthenticated)?;
    let user = state.engine.user(&identity.login).await?;
    Ok(Json(UserResponse::from(user)))
}
