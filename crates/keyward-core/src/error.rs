//! Error taxonomy for the token lifecycle engine
//!
//! Every operation returns a typed outcome. Transport-level representation
//! (HTTP status, CLI exit code) is decided by the boundary that calls in.

use thiserror::Error;

/// Core error type for keyward operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("Token is malformed or its signature does not verify")]
    MalformedOrBadSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("You do not have permission to perform this action")]
    PermissionDenied,

    #[error("User not found")]
    UserNotFound,

    #[error("Role not found")]
    RoleNotFound,

    #[error("Name already exists: {0}")]
    DuplicateName(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    /// Store or cache connectivity failure, passed through unchanged.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// True for the failures that mean "this bearer token is not usable".
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            Self::MalformedOrBadSignature | Self::Expired | Self::Revoked
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
