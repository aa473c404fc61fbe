//! In-memory cache implementation using moka

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;

use crate::domain::cache::{is_placeholder_value, Cache, PLACEHOLDER};
use crate::domain::DomainError;

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Lifetime of not-found placeholders
    pub placeholder_ttl: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            placeholder_ttl: Duration::from_secs(600),
        }
    }
}

impl InMemoryCacheConfig {
    /// Sets the maximum number of entries
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Sets the placeholder TTL
    pub fn with_placeholder_ttl(mut self, ttl: Duration) -> Self {
        self.placeholder_ttl = ttl;
        self
    }
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Serialized JSON value or the placeholder sentinel
    data: String,
    /// Lifetime requested by the writer
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-local cache backed by moka
///
/// Features:
/// - TTL support per entry
/// - LRU-like eviction when capacity is reached
/// - Concurrent access without a global lock
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
    config: InMemoryCacheConfig,
}

impl InMemoryCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self { cache, config }
    }

    /// Returns approximate number of live entries
    pub async fn size(&self) -> usize {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count() as usize
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<String, DomainError> {
        match self.cache.get(key).await {
            Some(entry) if is_placeholder_value(&entry.data) => {
                Err(DomainError::cache_placeholder(key))
            }
            Some(entry) => Ok(entry.data),
            None => Err(DomainError::cache_miss(key)),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let entry = CacheEntry {
            data: value.to_string(),
            ttl,
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn multi_get_raw(&self, keys: &[String]) -> Result<HashMap<String, String>, DomainError> {
        let mut found = HashMap::with_capacity(keys.len());

        for key in keys {
            if let Some(entry) = self.cache.get(key).await {
                if !is_placeholder_value(&entry.data) {
                    found.insert(key.clone(), entry.data);
                }
            }
        }

        Ok(found)
    }

    async fn multi_set_raw(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), DomainError> {
        for (key, value) in entries {
            self.set_raw(key, value, ttl).await?;
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn set_placeholder(&self, key: &str) -> Result<(), DomainError> {
        self.set_raw(key, PLACEHOLDER, self.config.placeholder_ttl)
            .await
    }

    fn placeholder_ttl(&self) -> Duration {
        self.config.placeholder_ttl
    }
}
