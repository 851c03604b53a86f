//! Role management handlers (superuser only)
//!
//! Each handler runs the superuser guard on the resolved identity before
//! touching the role service.

use crate::audit::{audit_log, AuditEvent};
use crate::error::{ApiError, AppError};
use crate::handlers::auth::UserResponse;
use crate::middleware::CurrentIdentity;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use keyward_core::{AuthError, Identity, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RoleRequest {
    #[validate(length(min = 1, max = 255, message = "Role name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RoleAssignmentRequest {
    #[validate(length(min = 1, message = "Login is required"))]
    pub login: String,
    #[validate(length(min = 1, message = "Role name is required"))]
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRolesQuery {
    /// Rows to skip (default 0)
    pub offset: Option<i64>,
    /// Maximum rows (default 100)
    pub limit: Option<i64>,
}

fn require_superuser<'a>(
    state: &AppState,
    identity: &'a CurrentIdentity,
    resource: &str,
) -> Result<&'a Identity, AppError> {
    state.engine.require_superuser(identity.get()).map_err(|err| {
        if err == AuthError::PermissionDenied {
            audit_log(&AuditEvent::AccessDenied {
                login: identity.get().map(|id| id.login.clone()),
                resource: resource.to_string(),
                ip_address: None,
            });
        }
        AppError::from(err)
    })
}

/// List roles ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/roles",
    tag = "roles",
    params(ListRolesQuery),
    responses(
        (status = 200, description = "Roles", body = [RoleResponse]),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Superuser required", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Query(query): Query<ListRolesQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_superuser(&state, &identity, "roles")?;

    let roles = state
        .engine
        .roles()
        .list_roles(query.offset.unwrap_or(0), query.limit.unwrap_or(100))
        .await?;
    let body: Vec<RoleResponse> = roles.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/api/v1/roles",
    tag = "roles",
    request_body = RoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 400, description = "Invalid input or name taken", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Superuser required", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Json(request): Json<RoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_superuser(&state, &identity, "roles")?;
    request.validate()?;

    let role = state
        .engine
        .roles()
        .create_role(&request.name, request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/{id}",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role", body = RoleResponse),
        (status = 404, description = "Role not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_superuser(&state, &identity, "roles")?;

    let role = state.engine.roles().get_role(id).await?;
    Ok(Json(RoleResponse::from(role)))
}

#[utoipa::path(
    put,
    path = "/api/v1/roles/{id}",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 400, description = "Invalid input or name taken", body = ApiError),
        (status = 404, description = "Role not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
    Json(request): Json<RoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_superuser(&state, &identity, "roles")?;
    request.validate()?;

    let role = state
        .engine
        .roles()
        .update_role(id, &request.name, request.description)
        .await?;
    Ok(Json(RoleResponse::from(role)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/{id}",
    tag = "roles",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Role not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    require_superuser(&state, &identity, "roles")?;

    state.engine.roles().delete_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grant a role to a user
#[utoipa::path(
    post,
    path = "/api/v1/roles/assign",
    tag = "roles",
    request_body = RoleAssignmentRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Role already assigned", body = ApiError),
        (status = 404, description = "User or role not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Json(request): Json<RoleAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = require_superuser(&state, &identity, "roles/assign")?;
    request.validate()?;

    let user = state
        .engine
        .roles()
        .assign_role(&request.login, &request.role)
        .await?;

    audit_log(&AuditEvent::RoleChange {
        actor: actor.login.clone(),
        login: request.login,
        role: request.role,
        granted: true,
    });
    Ok(Json(UserResponse::from(user)))
}

/// Take a role away from a user
#[utoipa::path(
    post,
    path = "/api/v1/roles/remove",
    tag = "roles",
    request_body = RoleAssignmentRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Role not assigned", body = ApiError),
        (status = 404, description = "User or role not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_role(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CurrentIdentity>,
    Json(request): Json<RoleAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = require_superuser(&state, &identity, "roles/remove")?;
    request.validate()?;

    let user = state
        .engine
        .roles()
        .remove_role(&request.login, &request.role)
        .await?;

    audit_log(&AuditEvent::RoleChange {
        actor: actor.login.clone(),
        login: request.login,
        role: request.role,
        granted: false,
    });
    Ok(Json(UserResponse::from(user)))
}
