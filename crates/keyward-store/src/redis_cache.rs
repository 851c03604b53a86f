//! Redis revocation cache
//!
//! Revoked identifiers are plain string keys written with `SET key value EX
//! ttl`, so expiry is handled by Redis itself.

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use keyward_core::config::CacheConfig;
use keyward_core::{AuthError, Result, RevocationStore};

/// Revocation store over a multiplexed, auto-reconnecting connection
#[derive(Clone)]
pub struct RedisRevocationStore {
    conn: ConnectionManager,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> AuthError {
    AuthError::transport(format!("redis {operation} failed: {err}"))
}

impl RedisRevocationStore {
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| map_redis_error("open", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("connect", e))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("SET", e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| map_redis_error("GET", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::revocation_key;
    use std::time::Duration;

    async fn store() -> RedisRevocationStore {
        let config = CacheConfig {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| CacheConfig::default().redis_url),
        };
        RedisRevocationStore::connect(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_bad_url_is_transport_error() {
        let config = CacheConfig {
            redis_url: "not-a-url".to_string(),
        };
        assert!(matches!(
            RedisRevocationStore::connect(&config).await,
            Err(AuthError::Transport(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_put_get_and_expiry() {
        let store = store().await;
        let key = revocation_key(&uuid::Uuid::new_v4().to_string());

        assert_eq!(store.get(&key).await.unwrap(), None);
        store.put(&key, "the-token", 1).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("the-token"));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}
