//! Engine context
//!
//! `AuthEngine` is built once at process start from configuration and owned
//! collaborator handles. Every component receives its handles explicitly;
//! there is no ambient state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::codec::TokenCodec;
use crate::config::{AppConfig, PasswordConfig};
use crate::credentials::CredentialVerifier;
use crate::error::{AuthError, Result};
use crate::guard::RoleGuard;
use crate::history::LoginHistoryRecorder;
use crate::memory::{InMemoryStore, MemoryRevocationStore};
use crate::models::{Identity, LoginRecord, NewUser, TokenClaims, TokenPair, User, UserRecord};
use crate::password::hash_password;
use crate::roles::RoleService;
use crate::store::{RevocationStore, RoleStore, UserStore};
use crate::tokens::{RefreshFlow, TokenIssuer, TokenRevoker, TokenValidator};

pub struct AuthEngine {
    users: Arc<dyn UserStore>,
    password: PasswordConfig,
    credentials: CredentialVerifier,
    issuer: Arc<TokenIssuer>,
    validator: Arc<TokenValidator>,
    refresh: RefreshFlow,
    revoker: TokenRevoker,
    guard: RoleGuard,
    history: LoginHistoryRecorder,
    roles: RoleService,
}

impl AuthEngine {
    pub fn new(
        config: &AppConfig,
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AuthError::validation(e.to_string()))?;

        let codec = Arc::new(TokenCodec::from_config(&config.token)?);
        let issuer = Arc::new(TokenIssuer::new(codec.clone(), users.clone(), &config.token)?);
        let validator = Arc::new(TokenValidator::new(codec.clone(), revocations.clone()));

        Ok(Self {
            credentials: CredentialVerifier::new(users.clone(), &config.password)?,
            refresh: RefreshFlow::new(validator.clone(), issuer.clone(), users.clone()),
            revoker: TokenRevoker::new(codec, revocations, &config.token),
            guard: RoleGuard,
            history: LoginHistoryRecorder::new(users.clone(), config.history.clone()),
            roles: RoleService::new(roles, users.clone()),
            password: config.password.clone(),
            issuer,
            validator,
            users,
        })
    }

    /// Engine backed entirely by in-process collaborators
    pub fn in_memory(config: &AppConfig) -> Result<Self> {
        let store = Arc::new(InMemoryStore::new());
        Self::new(
            config,
            store.clone(),
            store,
            Arc::new(MemoryRevocationStore::new()),
        )
    }

    /// Register a regular account
    pub async fn signup(&self, new_user: NewUser) -> Result<User> {
        self.register(new_user, false).await
    }

    /// Register an account that already carries the superuser flag
    pub async fn create_superuser(&self, new_user: NewUser) -> Result<User> {
        self.register(new_user, true).await
    }

    async fn register(&self, new_user: NewUser, is_superuser: bool) -> Result<User> {
        if new_user.login.trim().is_empty() {
            return Err(AuthError::validation("login must not be empty"));
        }
        if new_user.password.is_empty() {
            return Err(AuthError::validation("password must not be empty"));
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            password_hash: hash_password(&new_user.password, &self.password)?,
            login: new_user.login,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            is_superuser,
            created_at: Utc::now(),
        };
        let user = self.users.create_user(&record).await?;
        info!(login = %user.login, is_superuser, "user registered");
        Ok(user)
    }

    /// Check credentials, issue a pair and append the login event
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
        signin_data: Option<String>,
    ) -> Result<TokenPair> {
        let user = self.credentials.verify(login, password).await?;

        let now = Utc::now();
        let issued = self.issuer.mint(&user, now)?;
        self.history
            .record(&user, signin_data, issued.issued_at, &issued.audit_record(user.id))
            .await?;

        info!(login = %user.login, jti = %issued.jti, "user authenticated");
        Ok(issued.pair)
    }

    /// Validate any token of a pair and return its claims
    pub async fn check_token(&self, token: &str) -> Result<TokenClaims> {
        self.validator.validate(token).await
    }

    /// Validate an access token and resolve the current state of its user
    pub async fn validate_access(&self, token: &str) -> Result<Identity> {
        let claims = self.validator.validate(token).await?;
        match self.users.find_by_login(&claims.user).await? {
            Some(user) => Ok(Identity::from_user(&user, claims.jti)),
            None => {
                warn!(login = %claims.user, "valid token for a missing account");
                Err(AuthError::Unauthenticated)
            }
        }
    }

    pub async fn refresh(&self, token: &str) -> Result<TokenPair> {
        self.refresh.refresh(token).await
    }

    /// Logout. Returns the claims of the token that was revoked.
    pub async fn revoke(&self, token: &str) -> Result<TokenClaims> {
        self.revoker.revoke(token).await
    }

    pub async fn history(
        &self,
        login: &str,
        page_number: u32,
        page_size: Option<u32>,
    ) -> Result<Vec<LoginRecord>> {
        self.history.history(login, page_number, page_size).await
    }

    pub fn require_superuser<'a>(&self, identity: Option<&'a Identity>) -> Result<&'a Identity> {
        self.guard.require_superuser(identity)
    }

    pub fn roles(&self) -> &RoleService {
        &self.roles
    }

    pub async fn user(&self, login: &str) -> Result<User> {
        self.users
            .find_by_login(login)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Administrative toggle of the superuser flag
    pub async fn set_superuser(&self, login: &str, is_superuser: bool) -> Result<User> {
        let user = self
            .users
            .set_superuser(login, is_superuser)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        info!(login, is_superuser, "superuser flag changed");
        Ok(user)
    }

    /// Hash a password with the engine's cost parameters
    pub fn hash_password(&self, password: &str) -> Result<String> {
        hash_password(password, &self.password)
    }
}
