//! Capability check run by the caller before a restricted operation

use tracing::warn;

use crate::error::{AuthError, Result};
use crate::models::Identity;

#[derive(Debug, Clone, Copy, Default)]
pub struct RoleGuard;

impl RoleGuard {
    /// `None` means no identity could be resolved for the caller
    pub fn require_superuser<'a>(&self, identity: Option<&'a Identity>) -> Result<&'a Identity> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;
        if !identity.is_superuser {
            warn!(login = %identity.login, "superuser capability required");
            return Err(AuthError::PermissionDenied);
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity(is_superuser: bool) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            login: "alice".to_string(),
            roles: vec![],
            is_superuser,
            jti: Uuid::new_v4().to_string(),
        }
    }

    #[test]
    fn test_require_superuser() {
        let guard = RoleGuard;
        let admin = identity(true);
        let regular = identity(false);

        assert_eq!(guard.require_superuser(Some(&admin)), Ok(&admin));
        assert_eq!(
            guard.require_superuser(Some(&regular)),
            Err(AuthError::PermissionDenied)
        );
        assert_eq!(guard.require_superuser(None), Err(AuthError::Unauthenticated));
    }

    #[test]
    fn test_roles_do_not_grant_superuser() {
        let mut regular = identity(false);
        regular.roles = vec!["admin".to_string(), "superuser".to_string()];
        assert_eq!(
            RoleGuard.require_superuser(Some(&regular)),
            Err(AuthError::PermissionDenied)
        );
    }
}
