//! Password hashing and verification using Argon2id
//!
//! Hashes are PHC strings: algorithm, parameters and the random 16-byte salt
//! are all embedded, so no separate salt column is needed.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};

use crate::config::PasswordConfig;
use crate::error::{AuthError, Result};

impl PasswordConfig {
    fn to_params(&self) -> Result<Params> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| AuthError::Crypto(format!("invalid argon2 parameters: {e}")))
    }
}

/// Hash a plaintext password with the given Argon2id cost parameters
pub fn hash_password(password: &str, config: &PasswordConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Crypto(format!("failed to hash password: {e}")))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash
///
/// Returns `Ok(false)` on mismatch. A stored hash that cannot be parsed is a
/// `Crypto` error rather than a mismatch. The comparison itself is
/// constant-time inside `argon2`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AuthError::Crypto("invalid password hash format".to_string()))?;

    // Parameters come from the PHC string, not from the defaults
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("failed to verify password: {e}"))),
    }
}

#[cfg(test)]
pub(crate) fn fast_config() -> PasswordConfig {
    PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
        output_len: Some(32),
    }
}
