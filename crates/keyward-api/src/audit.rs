//! Security audit logging for authentication events
//!
//! All audit events are logged at INFO level with the "audit" target, so they
//! can be filtered and routed separately from application logs. The event
//! itself is serialized as JSON into the `event` field.

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess {
        login: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginFailure {
        login: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationSuccess {
        user_id: Uuid,
        login: String,
        ip_address: Option<String>,
    },

    RegistrationFailure {
        login: String,
        reason: String,
        ip_address: Option<String>,
    },

    TokenRefresh {
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    Logout {
        login: String,
        jti: String,
        ip_address: Option<String>,
    },

    /// Bearer token rejected (malformed, expired or revoked)
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Caller lacked the capability for a restricted operation
    AccessDenied {
        login: Option<String>,
        resource: String,
        ip_address: Option<String>,
    },

    /// Role assignment changed by a superuser
    RoleChange {
        actor: String,
        login: String,
        role: String,
        granted: bool,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::RoleChange { granted: true, .. } => "Role granted",
            AuditEvent::RoleChange { granted: false, .. } => "Role revoked",
        }
    }
}

/// Log a security audit event on the "audit" target
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %Utc::now(),
        event = %event_json,
        "{}",
        event.summary()
    );
}

/// Client IP from proxy headers; the first X-Forwarded-For hop wins
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|xff| xff.to_str().ok())
        .and_then(|xff| xff.split(',').next())
    {
        return Some(first_ip.trim().to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|ip| ip.to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            login: "alice".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "login_success");
        assert_eq!(json["login"], "alice");
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(&AuditEvent::RoleChange {
            actor: "root".to_string(),
            login: "alice".to_string(),
            role: "editor".to_string(),
            granted: true,
        });
    }

    #[test]
    fn test_extract_ip_address() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_ip_address(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(extract_ip_address(&headers).as_deref(), Some("10.0.0.2"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(extract_ip_address(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_extract_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.5"));
        assert_eq!(extract_user_agent(&headers).as_deref(), Some("curl/8.5"));
    }
}
