//! Login/password checks against stored Argon2id hashes

use std::sync::Arc;

use tracing::warn;

use crate::config::PasswordConfig;
use crate::error::{AuthError, Result};
use crate::models::User;
use crate::password::{hash_password, verify_password};
use crate::store::UserStore;

pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    /// Verified against when the login is unknown, so both paths cost one
    /// Argon2 run
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>, config: &PasswordConfig) -> Result<Self> {
        let dummy_hash = hash_password("keyward-dummy-password", config)?;
        Ok(Self { users, dummy_hash })
    }

    /// Resolve the user behind a login/password pair
    ///
    /// Unknown login and wrong password are indistinguishable to the caller.
    /// Read-only.
    pub async fn verify(&self, login: &str, password: &str) -> Result<User> {
        let Some(user) = self.users.find_by_login(login).await? else {
            verify_password(password, &self.dummy_hash)?;
            warn!(login, "sign-in rejected: unknown login");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(login, "sign-in rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }
}
