//! Keyward core: token lifecycle engine and authorization guard
//!
//! Issues, validates, rotates and revokes signed bearer tokens, and gates
//! superuser-only operations. Persistence and the revocation cache are
//! reached through the traits in [`store`]; production adapters live in
//! `keyward-store`, in-process ones in [`memory`].

pub mod codec;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod guard;
pub mod history;
pub mod memory;
pub mod models;
pub mod password;
pub mod roles;
pub mod store;
pub mod tokens;

pub use codec::TokenCodec;
pub use config::{AppConfig, ConfigError};
pub use engine::AuthEngine;
pub use error::{AuthError, Result};
pub use guard::RoleGuard;
pub use models::{
    Identity, LoginRecord, NewUser, RefreshTokenRecord, Role, TokenClaims, TokenPair, User,
    UserRecord, UserRole,
};
pub use store::{revocation_key, RevocationStore, RoleStore, UserStore};
