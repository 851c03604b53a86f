//! Collaborator interfaces
//!
//! The engine reaches the relational store and the revocation cache only
//! through these traits. Lookups return `Option`; turning a miss into a
//! domain error is the caller's decision.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{LoginRecord, RefreshTokenRecord, Role, User, UserRecord, UserRole};

/// Key prefix for revoked token identifiers
pub const REVOCATION_KEY_PREFIX: &str = "token:";

pub fn revocation_key(jti: &str) -> String {
    format!("{REVOCATION_KEY_PREFIX}{jti}")
}

/// Account persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account. A taken login is `DuplicateName`.
    async fn create_user(&self, record: &UserRecord) -> Result<User>;

    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn set_superuser(&self, login: &str, is_superuser: bool) -> Result<Option<User>>;

    /// Write the login event and the issuance audit row in one transaction
    async fn record_sign_in(&self, login: &LoginRecord, audit: &RefreshTokenRecord) -> Result<()>;

    /// Audit row for issuance outside a sign-in (rotation)
    async fn save_refresh_audit(&self, audit: &RefreshTokenRecord) -> Result<()>;

    /// Login events for a user, most recent first
    async fn login_history(&self, user_id: Uuid, limit: i64, offset: i64)
        -> Result<Vec<LoginRecord>>;

    /// Issuance audit rows for a user, most recent first
    async fn refresh_audit(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>>;
}

/// Role persistence and the user/role association
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// A taken name is `DuplicateName`
    async fn create_role(&self, role: &Role) -> Result<Role>;

    async fn get_role(&self, id: Uuid) -> Result<Option<Role>>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;

    async fn list_roles(&self, offset: i64, limit: i64) -> Result<Vec<Role>>;

    /// `None` when the role does not exist; a taken name is `DuplicateName`
    async fn update_role(&self, role: &Role) -> Result<Option<Role>>;

    /// Also drops the role's associations. `false` when nothing was deleted.
    async fn delete_role(&self, id: Uuid) -> Result<bool>;

    /// `false` when the pair already exists
    async fn assign_role(&self, pair: UserRole) -> Result<bool>;

    /// `false` when the pair did not exist
    async fn remove_role(&self, pair: UserRole) -> Result<bool>;
}

/// Key/value cache with per-key expiry
///
/// Operations are plain put/get on independent keys, so concurrent callers
/// never need coordination.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_key_format() {
        assert_eq!(revocation_key("abc-123"), "token:abc-123");
    }
}
