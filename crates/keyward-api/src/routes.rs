//! API route definitions

use crate::handlers::{auth, roles};
use crate::middleware::identity_middleware;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Token-in-body endpoints, no bearer header needed
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/signin", post(auth::signin_handler))
        .route("/auth/check_token", post(auth::check_token_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/signin_history", get(auth::signin_history_handler));

    // Bearer identity is resolved for these; handlers decide what they require
    let identified_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route("/roles/assign", post(roles::assign_role))
        .route("/roles/remove", post(roles::remove_role))
        .route(
            "/roles/:id",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        .layer(middleware::from_fn_with_state(state, identity_middleware));

    Router::new().merge(public_routes).merge(identified_routes)
}
