//! PostgreSQL relational store
//!
//! Implements the keyward user and role collaborators on SQLx. The schema is
//! managed outside this crate; `schema.sql` documents the expected shape.
//!
//! | Driver error | SQLSTATE | AuthError |
//! |---|---|---|
//! | unique violation | `23505` | `DuplicateName` |
//! | anything else | | `Transport` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use keyward_core::config::DatabaseConfig;
use keyward_core::{
    AuthError, LoginRecord, RefreshTokenRecord, Result, Role, RoleStore, User, UserRecord,
    UserRole, UserStore,
};

/// PostgreSQL-backed user and role store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect using the database section of the configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.postgres_url)
            .await
            .map_err(|e| AuthError::transport(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create missing tables from the bundled reference schema
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(crate::SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }

    async fn role_names(&self, user_id: Uuid) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("role_names", e))?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn with_roles(&self, row: Option<UserRow>) -> Result<Option<User>> {
        match row {
            Some(row) => {
                let roles = self.role_names(row.id).await?;
                Ok(Some(UserRecord::from(row).into_user(roles)))
            }
            None => Ok(None),
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AuthError {
    AuthError::transport(format!("{operation} failed: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    login: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
    is_superuser: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: row.id,
            login: row.login,
            password_hash: row.password,
            first_name: row.first_name,
            last_name: row.last_name,
            is_superuser: row.is_superuser,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(Debug, FromRow)]
struct LoginRow {
    id: Uuid,
    user_id: Uuid,
    login_at: DateTime<Utc>,
    signin_data: Option<String>,
}

impl From<LoginRow> for LoginRecord {
    fn from(row: LoginRow) -> Self {
        LoginRecord {
            id: row.id,
            user_id: row.user_id,
            login_at: row.login_at,
            signin_data: row.signin_data,
        }
    }
}

#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    token: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshTokenRecord {
            id: row.id,
            token: row.token,
            user_id: row.user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, login, password, first_name, last_name, is_superuser, created_at";

const INSERT_REFRESH_TOKEN: &str = r#"
    INSERT INTO refresh_tokens (id, token, user_id, created_at, expires_at)
    VALUES ($1, $2, $3, $4, $5)
"#;

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, record: &UserRecord) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, login, password, first_name, last_name, is_superuser, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(&record.login)
        .bind(&record.password_hash)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(record.is_superuser)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::DuplicateName(record.login.clone())
            } else {
                map_sqlx_error("create_user", e)
            }
        })?;

        Ok(record.clone().into_user(Vec::new()))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE login = $1"))
                .bind(login)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_by_login", e))?;

        self.with_roles(row).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_by_id", e))?;

        self.with_roles(row).await
    }

    async fn set_superuser(&self, login: &str, is_superuser: bool) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET is_superuser = $2 WHERE login = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(login)
        .bind(is_superuser)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_superuser", e))?;

        self.with_roles(row).await
    }

    async fn record_sign_in(&self, login: &LoginRecord, audit: &RefreshTokenRecord) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_sign_in", e))?;

        sqlx::query(INSERT_REFRESH_TOKEN)
            .bind(audit.id)
            .bind(&audit.token)
            .bind(audit.user_id)
            .bind(audit.created_at)
            .bind(audit.expires_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_refresh_token", e))?;

        sqlx::query(
            r#"
            INSERT INTO users_logins (id, user_id, login_at, signin_data)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(login.id)
        .bind(login.user_id)
        .bind(login.login_at)
        .bind(&login.signin_data)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_login", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_sign_in", e))?;

        Ok(())
    }

    async fn save_refresh_audit(&self, audit: &RefreshTokenRecord) -> Result<()> {
        sqlx::query(INSERT_REFRESH_TOKEN)
            .bind(audit.id)
            .bind(&audit.token)
            .bind(audit.user_id)
            .bind(audit.created_at)
            .bind(audit.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_refresh_token", e))?;
        Ok(())
    }

    async fn login_history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LoginRecord>> {
        let rows: Vec<LoginRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, login_at, signin_data
            FROM users_logins
            WHERE user_id = $1
            ORDER BY login_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("login_history", e))?;

        Ok(rows.into_iter().map(LoginRecord::from).collect())
    }

    async fn refresh_audit(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>> {
        let rows: Vec<RefreshTokenRow> = sqlx::query_as(
            r#"
            SELECT id, token, user_id, created_at, expires_at
            FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("refresh_audit", e))?;

        Ok(rows.into_iter().map(RefreshTokenRecord::from).collect())
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn create_role(&self, role: &Role) -> Result<Role> {
        let row: RoleRow = sqlx::query_as(
            r#"
            INSERT INTO roles (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, description
            "#,
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::DuplicateName(role.name.clone())
            } else {
                map_sqlx_error("create_role", e)
            }
        })?;

        Ok(row.into())
    }

    async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
        let row: Option<RoleRow> =
            sqlx::query_as("SELECT id, name, description FROM roles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_role", e))?;

        Ok(row.map(Role::from))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let row: Option<RoleRow> =
            sqlx::query_as("SELECT id, name, description FROM roles WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_role_by_name", e))?;

        Ok(row.map(Role::from))
    }

    async fn list_roles(&self, offset: i64, limit: i64) -> Result<Vec<Role>> {
        let rows: Vec<RoleRow> = sqlx::query_as(
            r#"
            SELECT id, name, description
            FROM roles
            ORDER BY name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_roles", e))?;

        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn update_role(&self, role: &Role) -> Result<Option<Role>> {
        let row: Option<RoleRow> = sqlx::query_as(
            r#"
            UPDATE roles SET name = $2, description = $3
            WHERE id = $1
            RETURNING id, name, description
            "#,
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::DuplicateName(role.name.clone())
            } else {
                map_sqlx_error("update_role", e)
            }
        })?;

        Ok(row.map(Role::from))
    }

    async fn delete_role(&self, id: Uuid) -> Result<bool> {
        // user_roles rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn assign_role(&self, pair: UserRole) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(pair.user_id)
        .bind(pair.role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("assign_role", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_role(&self, pair: UserRole) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(pair.user_id)
            .bind(pair.role_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_role", e))?;

        Ok(result.rows_affected() > 0)
    }
}
