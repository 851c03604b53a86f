//! Keyward API - HTTP boundary for the token service
//!
//! Exposes signup, sign-in, token check/refresh/logout, login history and
//! superuser-only role management over REST, with an OpenAPI document
//! served through Swagger UI.

pub mod audit;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use crate::handlers::{auth, health, roles};
use crate::state::AppState;
use axum::{http::HeaderValue, routing::get, Router};
use keyward_core::{AppConfig, AuthEngine};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Keyward API",
        description = "Token lifecycle and role management service"
    ),
    paths(
        health::health_check,
        auth::signup_handler,
        auth::signin_handler,
        auth::check_token_handler,
        auth::refresh_handler,
        auth::logout_handler,
        auth::signin_history_handler,
        auth::me_handler,
        roles::list_roles,
        roles::create_role,
        roles::get_role,
        roles::update_role,
        roles::delete_role,
        roles::assign_role,
        roles::remove_role,
    ),
    components(schemas(
        error::ApiError,
        health::HealthResponse,
        auth::SignupRequest,
        auth::SigninRequest,
        auth::TokenRequest,
        auth::UserResponse,
        auth::TokenResponse,
        auth::ClaimsResponse,
        auth::MessageResponse,
        auth::SigninRecordResponse,
        roles::RoleRequest,
        roles::RoleAssignmentRequest,
        roles::RoleResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Accounts and token lifecycle"),
        (name = "roles", description = "Role management (superuser only)"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// In-memory state with cheap password hashing, for tests and local runs
pub fn test_state() -> keyward_core::Result<Arc<AppState>> {
    let mut config = AppConfig::default();
    config.password.memory_cost = 1024;
    config.password.time_cost = 1;
    config.password.parallelism = 1;

    let engine = AuthEngine::in_memory(&config)?;
    Ok(Arc::new(AppState::new(config, Arc::new(engine))))
}

pub fn create_router_for_testing() -> keyward_core::Result<Router> {
    Ok(create_router(test_state()?))
}
