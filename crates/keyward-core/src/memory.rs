//! In-process collaborators
//!
//! `InMemoryStore` backs development mode and the test suites;
//! `MemoryRevocationStore` is a moka cache honouring per-entry TTLs, usable
//! wherever a single process owns the revocation list.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::models::{LoginRecord, RefreshTokenRecord, Role, User, UserRecord, UserRole};
use crate::store::{RevocationStore, RoleStore, UserStore};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    logins: HashMap<String, Uuid>,
    roles: HashMap<Uuid, Role>,
    user_roles: Vec<UserRole>,
    login_records: Vec<LoginRecord>,
    refresh_tokens: Vec<RefreshTokenRecord>,
}

impl Tables {
    fn role_names(&self, user_id: Uuid) -> Vec<String> {
        let mut names: Vec<String> = self
            .user_roles
            .iter()
            .filter(|pair| pair.user_id == user_id)
            .filter_map(|pair| self.roles.get(&pair.role_id))
            .map(|role| role.name.clone())
            .collect();
        names.sort();
        names
    }

    fn load(&self, id: Uuid) -> Option<User> {
        self.users
            .get(&id)
            .map(|record| record.clone().into_user(self.role_names(id)))
    }

    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.roles
            .values()
            .any(|role| role.name == name && Some(role.id) != except)
    }
}

/// Relational store kept in process memory
///
/// Locks are never held across an await point.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, record: &UserRecord) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.logins.contains_key(&record.login) {
            return Err(AuthError::DuplicateName(record.login.clone()));
        }
        tables.logins.insert(record.login.clone(), record.id);
        tables.users.insert(record.id, record.clone());
        Ok(record.clone().into_user(Vec::new()))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.logins.get(login).and_then(|id| tables.load(*id)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.load(id))
    }

    async fn set_superuser(&self, login: &str, is_superuser: bool) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(id) = tables.logins.get(login).copied() else {
            return Ok(None);
        };
        if let Some(record) = tables.users.get_mut(&id) {
            record.is_superuser = is_superuser;
        }
        Ok(tables.load(id))
    }

    async fn record_sign_in(&self, login: &LoginRecord, audit: &RefreshTokenRecord) -> Result<()> {
        // Single write guard: both rows become visible together
        let mut tables = self.tables.write().await;
        tables.login_records.push(login.clone());
        tables.refresh_tokens.push(audit.clone());
        Ok(())
    }

    async fn save_refresh_audit(&self, audit: &RefreshTokenRecord) -> Result<()> {
        self.tables.write().await.refresh_tokens.push(audit.clone());
        Ok(())
    }

    async fn login_history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LoginRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<LoginRecord> = tables
            .login_records
            .iter()
            .rev()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.login_at.cmp(&a.login_at));

        Ok(records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn refresh_audit(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<RefreshTokenRecord> = tables
            .refresh_tokens
            .iter()
            .rev()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn create_role(&self, role: &Role) -> Result<Role> {
        let mut tables = self.tables.write().await;
        if tables.name_taken(&role.name, None) {
            return Err(AuthError::DuplicateName(role.name.clone()));
        }
        tables.roles.insert(role.id, role.clone());
        Ok(role.clone())
    }

    async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|role| role.name == name).cloned())
    }

    async fn list_roles(&self, offset: i64, limit: i64) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        let mut roles: Vec<Role> = tables.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_role(&self, role: &Role) -> Result<Option<Role>> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&role.id) {
            return Ok(None);
        }
        if tables.name_taken(&role.name, Some(role.id)) {
            return Err(AuthError::DuplicateName(role.name.clone()));
        }
        tables.roles.insert(role.id, role.clone());
        Ok(Some(role.clone()))
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.roles.remove(&id).is_none() {
            return Ok(false);
        }
        tables.user_roles.retain(|pair| pair.role_id != id);
        Ok(true)
    }

    async fn assign_role(&self, pair: UserRole) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.user_roles.contains(&pair) {
            return Ok(false);
        }
        tables.user_roles.push(pair);
        Ok(true)
    }

    async fn remove_role(&self, pair: UserRole) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.user_roles.len();
        tables.user_roles.retain(|existing| *existing != pair);
        Ok(tables.user_roles.len() != before)
    }
}

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Revocation list held in a moka cache
#[derive(Clone)]
pub struct MemoryRevocationStore {
    cache: Cache<String, Entry>,
}

impl MemoryRevocationStore {
    /// Unbounded: an entry leaves only when its own TTL runs out, never by
    /// size-based eviction.
    pub fn new() -> Self {
        let cache = Cache::builder().expire_after(PerEntryTtl).build();
        Self { cache }
    }
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let entry = Entry {
            value: value.to_string(),
            ttl: Duration::from_secs(ttl_secs),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }
}
