//! Redis cache implementation

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::{is_placeholder_value, Cache, PLACEHOLDER};
use crate::domain::DomainError;

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Lifetime of not-found placeholders
    pub placeholder_ttl: Duration,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            placeholder_ttl: Duration::from_secs(600),
            key_prefix: None,
        }
    }
}

impl RedisCacheConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the placeholder TTL
    pub fn with_placeholder_ttl(mut self, ttl: Duration) -> Self {
        self.placeholder_ttl = ttl;
        self
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// Redis cache implementation
///
/// Shared by every process pointing at the same server. TTLs are written with
/// millisecond precision (`PSETEX`).
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Creates a new Redis cache connection
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    fn prefix_key(&self, key: &str) -> String {
        prefixed(self.config.key_prefix.as_deref(), key)
    }
}

fn prefixed(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, key),
        None => key.to_string(),
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<String, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: Option<String> = conn.get(&prefixed_key).await.map_err(|e| {
            DomainError::cache(format!("Failed to get key '{}': {}", key, e))
        })?;

        match result {
            Some(value) if is_placeholder_value(&value) => {
                Err(DomainError::cache_placeholder(key))
            }
            Some(value) => Ok(value),
            None => Err(DomainError::cache_miss(key)),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let _: () = conn
            .pset_ex(&prefixed_key, value, ttl_millis(ttl))
            .await
            .map_err(|e| DomainError::cache(format!("Failed to set key '{}': {}", key, e)))?;

        Ok(())
    }

    async fn multi_get_raw(&self, keys: &[String]) -> Result<HashMap<String, String>, DomainError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let prefixed_keys: Vec<String> = keys.iter().map(|k| self.prefix_key(k)).collect();
        let mut conn = self.connection.clone();

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&prefixed_keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to get {} keys: {}", keys.len(), e)))?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| match value {
                Some(value) if !is_placeholder_value(&value) => Some((key.clone(), value)),
                _ => None,
            })
            .collect())
    }

    async fn multi_set_raw(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), DomainError> {
        if entries.is_empty() {
            return Ok(());
        }

        let millis = ttl_millis(ttl);
        let mut pipe = redis::pipe();

        for (key, value) in entries {
            pipe.pset_ex(self.prefix_key(key), value, millis).ignore();
        }

        let mut conn = self.connection.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to set {} keys: {}", entries.len(), e)))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i32 = conn.del(&prefixed_key).await.map_err(|e| {
            DomainError::cache(format!("Failed to delete key '{}': {}", key, e))
        })?;

        Ok(deleted > 0)
    }

    async fn set_placeholder(&self, key: &str) -> Result<(), DomainError> {
        self.set_raw(key, PLACEHOLDER, self.config.placeholder_ttl)
            .await
    }

    fn placeholder_ttl(&self) -> Duration {
        self.config.placeholder_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;

    // Note: These tests require a running Redis instance
    // Run with: cargo test -- --ignored

    fn get_test_config() -> RedisCacheConfig {
        RedisCacheConfig::new("redis://127.0.0.1:6379")
            .with_key_prefix("test")
            .with_placeholder_ttl(Duration::from_secs(60))
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_set_and_get() {
        let cache = RedisCache::new(get_test_config()).await.unwrap();

        cache
            .set("mob:1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let result: String = cache.get("mob:1").await.unwrap();
        assert_eq!(result, "value1");

        // Cleanup
        cache.delete("mob:1").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_placeholder_and_delete() {
        let cache = RedisCache::new(get_test_config()).await.unwrap();

        cache.set_placeholder("mob:404").await.unwrap();
        let err = cache.get_raw("mob:404").await.unwrap_err();
        assert!(cache.is_placeholder_err(&err));

        assert!(cache.delete("mob:404").await.unwrap());
        assert!(cache.get_raw("mob:404").await.unwrap_err().is_cache_miss());
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_multi_get() {
        let cache = RedisCache::new(get_test_config()).await.unwrap();
        let entries = vec![("item:1".to_string(), "1".to_string())];

        cache
            .multi_set_raw(&entries, Duration::from_secs(60))
            .await
            .unwrap();
        cache.set_placeholder("item:2").await.unwrap();

        let keys = vec!["item:1".to_string(), "item:2".to_string(), "item:3".to_string()];
        let found = cache.multi_get_raw(&keys).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("item:1").map(String::as_str), Some("1"));

        // Cleanup
        cache.delete("item:1").await.unwrap();
        cache.delete("item:2").await.unwrap();
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(prefixed(Some("world"), "mob:1"), "world:mob:1");
        assert_eq!(prefixed(None, "mob:1"), "mob:1");
    }

    #[test]
    fn test_sub_second_ttls_are_kept() {
        assert_eq!(ttl_millis(Duration::from_millis(250)), 250);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
    }
}
