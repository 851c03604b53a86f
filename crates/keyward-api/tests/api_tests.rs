//! API integration tests against the in-memory engine

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use keyward_api::{create_router, create_router_for_testing, state::AppState, test_state};
use keyward_core::memory::InMemoryStore;
use keyward_core::{AuthEngine, AuthError, NewUser, RevocationStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn authorized(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let mut request = create_json_request(method, uri, body);
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn signup_and_signin(app: &Router, login: &str, password: &str) -> Value {
    let (status, _) = send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/signup",
            Some(json!({"login": login, "password": password})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, tokens) = send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/signin",
            Some(json!({"login": login, "password": password})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    tokens
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing().unwrap();

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_openapi_json_served() {
    let app = create_router_for_testing().unwrap();

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/auth/refresh"].is_object());
}

// =============================================================================
// Auth Flow Tests
// =============================================================================

#[tokio::test]
async fn test_signup_returns_user_without_password() {
    let app = create_router_for_testing().unwrap();

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/signup",
            Some(json!({"login": "alice", "password": "pw", "first_name": "Alice"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["login"], "alice");
    assert_eq!(json["first_name"], "Alice");
    assert_eq!(json["is_superuser"], false);
    assert_eq!(json["roles"], json!([]));
    assert!(json.get("password").is_none());
    assert!(json.get("password_hash").is_none());
}

#[tokio::test]
async fn test_duplicate_signup_rejected() {
    let app = create_router_for_testing().unwrap();
    signup_and_signin(&app, "alice", "pw").await;

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/signup",
            Some(json!({"login": "alice", "password": "other"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "DUPLICATE_NAME");
}

#[tokio::test]
async fn test_signup_validation_error() {
    let app = create_router_for_testing().unwrap();

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/signup",
            Some(json!({"login": "", "password": "pw"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_signin_wrong_password() {
    let app = create_router_for_testing().unwrap();
    signup_and_signin(&app, "alice", "pw").await;

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/signin",
            Some(json!({"login": "alice", "password": "wrong"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_signin_unknown_login_same_error() {
    let app = create_router_for_testing().unwrap();

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/signin",
            Some(json!({"login": "ghost", "password": "pw"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_check_refresh_logout_flow() {
    let app = create_router_for_testing().unwrap();
    let tokens = signup_and_signin(&app, "alice", "pw").await;
    let access = tokens["access_token"].as_str().unwrap().to_string();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_string();
    assert_eq!(tokens["token_type"], "bearer");

    let (status, claims) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/check_token",
            Some(json!({"token": access})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claims["user"], "alice");

    let (status, rotated) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({"token": refresh})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["access_token"], tokens["access_token"]);

    let (status, _) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/logout", Some(json!({"token": access}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Revoking the access token blocks its sibling refresh token
    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({"token": refresh})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "TOKEN_REVOKED");

    // The rotated pair carries a fresh identifier
    let (status, _) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/check_token",
            Some(json!({"token": rotated["access_token"]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_check_token_garbage() {
    let app = create_router_for_testing().unwrap();

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/check_token",
            Some(json!({"token": "not-a-jwt"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = create_router_for_testing().unwrap();

    let (status, _) = send(&app, create_json_request("GET", "/api/v1/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let tokens = signup_and_signin(&app, "alice", "pw").await;
    let access = tokens["access_token"].as_str().unwrap();
    let (status, json) = send(&app, authorized("GET", "/api/v1/auth/me", access, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["login"], "alice");
}

#[tokio::test]
async fn test_signin_history() {
    let app = create_router_for_testing().unwrap();
    signup_and_signin(&app, "alice", "pw").await;

    let mut second = create_json_request(
        "POST",
        "/api/v1/auth/signin",
        Some(json!({"login": "alice", "password": "pw"})),
    );
    second
        .headers_mut()
        .insert("User-Agent", "keyward-test/1.0".parse().unwrap());
    let (status, _) = send(&app, second).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &app,
        create_json_request("GET", "/api/v1/auth/signin_history?login=alice", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["signin_data"], "keyward-test/1.0");

    let (status, _) = send(
        &app,
        create_json_request(
            "GET",
            "/api/v1/auth/signin_history?login=alice&page_number=0",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        create_json_request("GET", "/api/v1/auth/signin_history?login=ghost", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Role Management Tests
// =============================================================================

#[tokio::test]
async fn test_roles_require_token() {
    let app = create_router_for_testing().unwrap();

    let (status, _) = send(&app, create_json_request("GET", "/api/v1/roles", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        authorized("GET", "/api/v1/roles", "not-a-jwt", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_roles_forbidden_for_regular_user() {
    let app = create_router_for_testing().unwrap();
    let tokens = signup_and_signin(&app, "bob", "pw").await;
    let access = tokens["access_token"].as_str().unwrap();

    let (status, json) = send(
        &app,
        authorized(
            "POST",
            "/api/v1/roles",
            access,
            Some(json!({"name": "editor"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_superuser_role_management() {
    let state = test_state().unwrap();
    state
        .engine
        .create_superuser(NewUser {
            login: "root".to_string(),
            password: "rootpw".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = create_router(state);

    let (status, tokens) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/signin",
            Some(json!({"login": "root", "password": "rootpw"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let root = tokens["access_token"].as_str().unwrap().to_string();
    signup_and_signin(&app, "alice", "pw").await;

    let (status, role) = send(
        &app,
        authorized(
            "POST",
            "/api/v1/roles",
            &root,
            Some(json!({"name": "editor", "description": "Can edit"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let role_id = role["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        authorized("POST", "/api/v1/roles", &root, Some(json!({"name": "editor"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "DUPLICATE_NAME");

    let (status, user) = send(
        &app,
        authorized(
            "POST",
            "/api/v1/roles/assign",
            &root,
            Some(json!({"login": "alice", "role": "editor"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["roles"], json!(["editor"]));

    let (status, _) = send(
        &app,
        authorized(
            "POST",
            "/api/v1/roles/assign",
            &root,
            Some(json!({"login": "alice", "role": "editor"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // New sign-ins carry the granted role in their claims
    let (_, tokens) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/signin",
            Some(json!({"login": "alice", "password": "pw"})),
        ),
    )
    .await;
    let (_, claims) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/check_token",
            Some(json!({"token": tokens["access_token"]})),
        ),
    )
    .await;
    assert_eq!(claims["roles"], json!(["editor"]));

    let (status, updated) = send(
        &app,
        authorized(
            "PUT",
            &format!("/api/v1/roles/{role_id}"),
            &root,
            Some(json!({"name": "writer"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "writer");

    let (status, list) = send(&app, authorized("GET", "/api/v1/roles", &root, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, user) = send(
        &app,
        authorized(
            "POST",
            "/api/v1/roles/remove",
            &root,
            Some(json!({"login": "alice", "role": "writer"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["roles"], json!([]));

    let (status, _) = send(
        &app,
        authorized("DELETE", &format!("/api/v1/roles/{role_id}"), &root, None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        authorized("GET", &format!("/api/v1/roles/{role_id}"), &root, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Backing Service Failure Tests
// =============================================================================

struct UnreachableCache;

#[async_trait]
impl RevocationStore for UnreachableCache {
    async fn put(&self, _key: &str, _value: &str, _ttl_secs: u64) -> keyward_core::Result<()> {
        Err(AuthError::transport("cache connection refused"))
    }

    async fn get(&self, _key: &str) -> keyward_core::Result<Option<String>> {
        Err(AuthError::transport("cache connection refused"))
    }
}

fn router_with_unreachable_cache() -> Router {
    let config = test_state().unwrap().config.clone();
    let store = Arc::new(InMemoryStore::new());
    let engine =
        AuthEngine::new(&config, store.clone(), store, Arc::new(UnreachableCache)).unwrap();
    create_router(Arc::new(AppState::new(config, Arc::new(engine))))
}

#[tokio::test]
async fn test_bearer_with_unreachable_cache_is_503() {
    let app = router_with_unreachable_cache();
    let tokens = signup_and_signin(&app, "alice", "pw").await;
    let access = tokens["access_token"].as_str().unwrap();

    let (status, json) = send(&app, authorized("GET", "/api/v1/auth/me", access, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
    // Driver details stay out of the response body
    assert!(!json.to_string().contains("connection refused"));

    let (status, _) = send(&app, authorized("GET", "/api/v1/roles", access, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_token_endpoints_with_unreachable_cache_are_503() {
    let app = router_with_unreachable_cache();
    let tokens = signup_and_signin(&app, "alice", "pw").await;

    for uri in ["/api/v1/auth/check_token", "/api/v1/auth/logout"] {
        let (status, _) = send(
            &app,
            create_json_request("POST", uri, Some(json!({"token": tokens["access_token"]}))),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
    }
}
