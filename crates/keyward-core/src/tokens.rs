//! Token issuance, validation, rotation and revocation
//!
//! A token moves `Issued -> Valid -> {Expired | Revoked}`. Expiry is judged
//! from the signed `expire` claim alone; revocation is a lookup of
//! `token:<jti>` in the revocation store and is only consulted for tokens that
//! are authentic and unexpired.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::codec::TokenCodec;
use crate::config::TokenConfig;
use crate::error::{AuthError, Result};
use crate::models::{RefreshTokenRecord, TokenClaims, TokenPair, User};
use crate::store::{revocation_key, RevocationStore, UserStore};

fn lifetime(secs: u64, name: &str) -> Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| AuthError::validation(format!("{name} out of range: {secs}")))
}

/// One freshly minted pair together with what its audit row needs
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub jti: String,
    pub issued_at: DateTime<Utc>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl IssuedTokens {
    pub fn audit_record(&self, user_id: Uuid) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            token: self.pair.refresh_token.clone(),
            user_id,
            created_at: self.issued_at,
            expires_at: self.refresh_expires_at,
        }
    }
}

/// Builds access/refresh pairs sharing one fresh `jti`
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, users: Arc<dyn UserStore>, config: &TokenConfig) -> Result<Self> {
        Ok(Self {
            codec,
            users,
            access_lifetime: lifetime(config.access_token_lifetime_secs, "access token lifetime")?,
            refresh_lifetime: lifetime(config.refresh_token_lifetime_secs, "refresh token lifetime")?,
        })
    }

    /// Sign a pair without touching any store
    pub fn mint(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedTokens> {
        // The wire format carries microseconds; truncate so decode is exact
        let now = now.trunc_subsecs(6);
        let jti = Uuid::new_v4().to_string();

        let expires_at = |lifetime: Duration| {
            now.checked_add_signed(lifetime)
                .ok_or_else(|| AuthError::validation("token expiry overflows the calendar"))
        };
        let access_expires_at = expires_at(self.access_lifetime)?;
        let refresh_expires_at = expires_at(self.refresh_lifetime)?;

        let claims = |expire| TokenClaims {
            user: user.login.clone(),
            roles: user.roles.clone(),
            jti: jti.clone(),
            expire,
        };
        let access_token = self.codec.encode(&claims(access_expires_at))?;
        let refresh_token = self.codec.encode(&claims(refresh_expires_at))?;

        Ok(IssuedTokens {
            pair: TokenPair {
                access_token,
                refresh_token,
            },
            jti,
            issued_at: now,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Mint a pair and persist its audit row before returning
    pub async fn issue(&self, user: &User) -> Result<TokenPair> {
        self.issue_at(user, Utc::now()).await
    }

    pub async fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<TokenPair> {
        let issued = self.mint(user, now)?;
        self.users
            .save_refresh_audit(&issued.audit_record(user.id))
            .await?;
        Ok(issued.pair)
    }
}

/// Decodes a token and checks signature, expiry and revocation in that order
pub struct TokenValidator {
    codec: Arc<TokenCodec>,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenValidator {
    pub fn new(codec: Arc<TokenCodec>, revocations: Arc<dyn RevocationStore>) -> Self {
        Self { codec, revocations }
    }

    pub async fn validate(&self, token: &str) -> Result<TokenClaims> {
        self.validate_at(token, Utc::now()).await
    }

    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims> {
        let claims = self.codec.decode(token)?;

        if claims.is_expired_at(now) {
            debug!(jti = %claims.jti, user = %claims.user, "token expired");
            return Err(AuthError::Expired);
        }

        if self
            .revocations
            .get(&revocation_key(&claims.jti))
            .await?
            .is_some()
        {
            debug!(jti = %claims.jti, user = %claims.user, "token revoked");
            return Err(AuthError::Revoked);
        }

        Ok(claims)
    }
}

/// Exchanges a valid token for a brand new pair
///
/// The presented token is not revoked, so the same token can be rotated more
/// than once until it expires or is logged out.
pub struct RefreshFlow {
    validator: Arc<TokenValidator>,
    issuer: Arc<TokenIssuer>,
    users: Arc<dyn UserStore>,
}

impl RefreshFlow {
    pub fn new(
        validator: Arc<TokenValidator>,
        issuer: Arc<TokenIssuer>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            validator,
            issuer,
            users,
        }
    }

    pub async fn refresh(&self, token: &str) -> Result<TokenPair> {
        self.refresh_at(token, Utc::now()).await
    }

    pub async fn refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPair> {
        let claims = self.validator.validate_at(token, now).await?;

        let user = self
            .users
            .find_by_login(&claims.user)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let pair = self.issuer.issue_at(&user, now).await?;
        info!(user = %user.login, previous_jti = %claims.jti, "token pair rotated");
        Ok(pair)
    }
}

/// Records a token identifier in the revocation store (logout)
pub struct TokenRevoker {
    codec: Arc<TokenCodec>,
    revocations: Arc<dyn RevocationStore>,
    ttl_secs: u64,
}

impl TokenRevoker {
    /// Entries live for the access-token lifetime, whichever token of the
    /// pair is revoked.
    pub fn new(
        codec: Arc<TokenCodec>,
        revocations: Arc<dyn RevocationStore>,
        config: &TokenConfig,
    ) -> Self {
        Self {
            codec,
            revocations,
            ttl_secs: config.access_token_lifetime_secs,
        }
    }

    /// Only authentic tokens are recorded; an expired one is still accepted
    pub async fn revoke(&self, token: &str) -> Result<TokenClaims> {
        let claims = self.codec.decode(token)?;
        self.revocations
            .put(&revocation_key(&claims.jti), token, self.ttl_secs)
            .await?;
        info!(jti = %claims.jti, user = %claims.user, ttl_secs = self.ttl_secs, "token revoked");
        Ok(claims)
    }
}
