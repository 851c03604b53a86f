//! Bearer identity resolution
//!
//! Resolves the `Authorization: Bearer` header into a [`CurrentIdentity`]
//! request extension. A missing or rejected token yields an empty identity;
//! deciding whether that is acceptable is left to the handler, which runs the
//! superuser guard explicitly.

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use keyward_core::{AuthError, Identity};
use std::sync::Arc;

/// Identity resolved for the current request, if any
#[derive(Debug, Clone, Default)]
pub struct CurrentIdentity(pub Option<Identity>);

impl CurrentIdentity {
    pub fn get(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = match bearer_token(request.headers()) {
        Some(token) => match state.engine.validate_access(&token).await {
            Ok(identity) => Some(identity),
            Err(err) if err.is_token_rejection() || err == AuthError::Unauthenticated => {
                audit_log(&AuditEvent::InvalidToken {
                    reason: err.to_string(),
                    ip_address: extract_ip_address(request.headers()),
                    user_agent: extract_user_agent(request.headers()),
                });
                None
            }
            Err(err) => return Err(err.into()),
        },
        None => None,
    };

    request.extensions_mut().insert(CurrentIdentity(identity));
    Ok(next.run(request).await)
}
