//! Role management
//!
//! Callers are expected to pass the superuser guard first; nothing here
//! inspects the caller.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{Role, User, UserRole};
use crate::store::{RoleStore, UserStore};

pub struct RoleService {
    roles: Arc<dyn RoleStore>,
    users: Arc<dyn UserStore>,
}

fn check_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::validation("role name must not be empty"));
    }
    Ok(name.to_string())
}

impl RoleService {
    pub fn new(roles: Arc<dyn RoleStore>, users: Arc<dyn UserStore>) -> Self {
        Self { roles, users }
    }

    pub async fn create_role(&self, name: &str, description: Option<String>) -> Result<Role> {
        let role = Role {
            id: Uuid::new_v4(),
            name: check_name(name)?,
            description,
        };
        let role = self.roles.create_role(&role).await?;
        info!(role = %role.name, "role created");
        Ok(role)
    }

    pub async fn get_role(&self, id: Uuid) -> Result<Role> {
        self.roles.get_role(id).await?.ok_or(AuthError::RoleNotFound)
    }

    pub async fn list_roles(&self, offset: i64, limit: i64) -> Result<Vec<Role>> {
        if offset < 0 || limit < 0 {
            return Err(AuthError::validation("offset and limit must not be negative"));
        }
        self.roles.list_roles(offset, limit).await
    }

    pub async fn update_role(
        &self,
        id: Uuid,
        name: &str,
        description: Option<String>,
    ) -> Result<Role> {
        let role = Role {
            id,
            name: check_name(name)?,
            description,
        };
        self.roles
            .update_role(&role)
            .await?
            .ok_or(AuthError::RoleNotFound)
    }

    pub async fn delete_role(&self, id: Uuid) -> Result<()> {
        if !self.roles.delete_role(id).await? {
            return Err(AuthError::RoleNotFound);
        }
        info!(role_id = %id, "role deleted");
        Ok(())
    }

    /// Returns the user with the new role list
    pub async fn assign_role(&self, login: &str, role_name: &str) -> Result<User> {
        let pair = self.resolve(login, role_name).await?;
        if !self.roles.assign_role(pair).await? {
            return Err(AuthError::conflict(format!(
                "user {login} already has role {role_name}"
            )));
        }
        info!(login, role = role_name, "role assigned");
        self.reload(pair.user_id).await
    }

    pub async fn remove_role(&self, login: &str, role_name: &str) -> Result<User> {
        let pair = self.resolve(login, role_name).await?;
        if !self.roles.remove_role(pair).await? {
            return Err(AuthError::conflict(format!(
                "user {login} does not have role {role_name}"
            )));
        }
        info!(login, role = role_name, "role removed");
        self.reload(pair.user_id).await
    }

    async fn resolve(&self, login: &str, role_name: &str) -> Result<UserRole> {
        let user = self
            .users
            .find_by_login(login)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let role = self
            .roles
            .find_role_by_name(role_name)
            .await?
            .ok_or(AuthError::RoleNotFound)?;
        Ok(UserRole {
            user_id: user.id,
            role_id: role.id,
        })
    }

    async fn reload(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::models::UserRecord;
    use chrono::Utc;

    async fn service() -> RoleService {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_user(&UserRecord {
                id: Uuid::new_v4(),
                login: "alice".to_string(),
                password_hash: String::new(),
                first_name: None,
                last_name: None,
                is_superuser: false,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        RoleService::new(store.clone(), store)
    }

    #[tokio::test]
    async fn test_role_crud() {
        let svc = service().await;
        let role = svc
            .create_role("editor", Some("can edit".to_string()))
            .await
            .unwrap();

        assert_eq!(svc.get_role(role.id).await.unwrap(), role);
        assert!(matches!(
            svc.create_role("editor", None).await,
            Err(AuthError::DuplicateName(_))
        ));

        let renamed = svc.update_role(role.id, "writer", None).await.unwrap();
        assert_eq!(renamed.name, "writer");
        assert_eq!(renamed.description, None);

        svc.create_role("admin", None).await.unwrap();
        let names: Vec<_> = svc
            .list_roles(0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["admin", "writer"]);

        svc.delete_role(role.id).await.unwrap();
        assert_eq!(svc.get_role(role.id).await, Err(AuthError::RoleNotFound));
        assert_eq!(svc.delete_role(role.id).await, Err(AuthError::RoleNotFound));
    }

    #[tokio::test]
    async fn test_update_missing_role() {
        let svc = service().await;
        assert_eq!(
            svc.update_role(Uuid::new_v4(), "x", None).await,
            Err(AuthError::RoleNotFound)
        );
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let svc = service().await;
        assert!(matches!(
            svc.create_role("   ", None).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_assign_and_remove() {
        let svc = service().await;
        svc.create_role("editor", None).await.unwrap();

        let user = svc.assign_role("alice", "editor").await.unwrap();
        assert_eq!(user.roles, vec!["editor".to_string()]);

        assert!(matches!(
            svc.assign_role("alice", "editor").await,
            Err(AuthError::Conflict(_))
        ));
        assert_eq!(
            svc.assign_role("bob", "editor").await,
            Err(AuthError::UserNotFound)
        );
        assert_eq!(
            svc.assign_role("alice", "ghost").await,
            Err(AuthError::RoleNotFound)
        );

        let user = svc.remove_role("alice", "editor").await.unwrap();
        assert!(user.roles.is_empty());
        assert!(matches!(
            svc.remove_role("alice", "editor").await,
            Err(AuthError::Conflict(_))
        ));
    }
}
