//! Production collaborators for the keyward engine
//!
//! - [`PgStore`]: users, roles, associations, login events and issuance
//!   audit rows in PostgreSQL
//! - [`RedisRevocationStore`]: revoked token identifiers with per-key expiry

pub mod postgres;
pub mod redis_cache;

pub use postgres::PgStore;
pub use redis_cache::RedisRevocationStore;

/// Reference schema for the tables [`PgStore`] expects
pub const SCHEMA: &str = include_str!("../schema.sql");
