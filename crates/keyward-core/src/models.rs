//! Data model shared by the engine and its collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored account
///
/// `roles` is the list of role names resolved through the user/role
/// association at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    /// Argon2id PHC string, never plaintext
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Signup input before hashing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub login: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Row handed to the store once the password is hashed
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub login: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn into_user(self, roles: Vec<String>) -> User {
        User {
            id: self.id,
            login: self.login,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            is_superuser: self.is_superuser,
            roles,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// User/role association; the pair is unique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// Audit row written on every issuance
///
/// Never consulted by validation; the signed token is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Append-only login event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub login_at: DateTime<Utc>,
    pub signin_data: Option<String>,
}

/// Claims carried by both access and refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Login of the subject
    pub user: String,
    pub roles: Vec<String>,
    /// Shared by the access and refresh token of one pair
    pub jti: String,
    #[serde(with = "expire_format")]
    pub expire: DateTime<Utc>,
}

impl TokenClaims {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Caller identity resolved from a valid access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub login: String,
    pub roles: Vec<String>,
    pub is_superuser: bool,
    pub jti: String,
}

impl Identity {
    pub fn from_user(user: &User, jti: impl Into<String>) -> Self {
        Self {
            user_id: user.id,
            login: user.login.clone(),
            roles: user.roles.clone(),
            is_superuser: user.is_superuser,
            jti: jti.into(),
        }
    }
}

/// `expire` wire format: UTC timestamp with six fractional digits
pub mod expire_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound};

    fn claims(expire: DateTime<Utc>) -> TokenClaims {
        TokenClaims {
            user: "alice".to_string(),
            roles: vec!["editor".to_string()],
            jti: Uuid::new_v4().to_string(),
            expire,
        }
    }

    #[test]
    fn test_expire_wire_format() {
        let expire = DateTime::parse_from_rfc3339("2024-03-01T10:20:30.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = serde_json::to_value(claims(expire)).unwrap();
        assert_eq!(json["expire"], "2024-03-01 10:20:30.123456");

        let back: TokenClaims = serde_json::from_value(json).unwrap();
        assert_eq!(back.expire, expire);
    }

    #[test]
    fn test_expire_rejects_other_formats() {
        let json = serde_json::json!({
            "user": "alice",
            "roles": [],
            "jti": "x",
            "expire": "2024-03-01T10:20:30Z",
        });
        assert!(serde_json::from_value::<TokenClaims>(json).is_err());
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now().trunc_subsecs(6);
        let c = claims(now);
        assert!(c.is_expired_at(now));
        assert!(!c.is_expired_at(now - Duration::microseconds(1)));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            login: "alice".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: None,
            last_name: None,
            is_superuser: false,
            roles: vec![],
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }
}
