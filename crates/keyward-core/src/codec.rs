//! Signed token encoding and decoding
//!
//! Tokens are compact JWS (header, payload, signature) signed with a
//! symmetric secret. Expiry lives in the custom `expire` claim, so the
//! registered-claim checks of `jsonwebtoken` are switched off and expiry is
//! judged by the validator against an explicit clock.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::config::TokenConfig;
use crate::error::{AuthError, Result};
use crate::models::TokenClaims;

#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &TokenConfig) -> Result<Self> {
        let algorithm = config
            .algorithm()
            .map_err(|e| AuthError::validation(e.to_string()))?;
        Ok(Self::new(config.secret_key.as_bytes(), algorithm))
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn encode(&self, claims: &TokenClaims) -> Result<String> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("failed to sign token: {e}")))
    }

    /// Decode and verify the signature. Expiry is not checked here.
    pub fn decode(&self, token: &str) -> Result<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(kind = ?e.kind(), "token rejected by codec");
                AuthError::MalformedOrBadSignature
            })
    }
}
