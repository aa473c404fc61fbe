//! Cache factory for startup-time backend selection

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::cache::Cache;
use crate::domain::DomainError;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};

/// Supported cache types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheType {
    /// In-memory cache using moka
    #[default]
    InMemory,
    /// Redis cache
    Redis,
    /// No cache; repositories read the store directly
    Disabled,
}

impl CacheType {
    /// Resolves a configuration selector
    ///
    /// Unrecognized selectors disable caching instead of failing startup.
    pub fn from_selector(selector: &str) -> Self {
        match selector.parse() {
            Ok(cache_type) => cache_type,
            Err(_) => {
                warn!(selector = %selector, "Unrecognized cache type, caching disabled");
                CacheType::Disabled
            }
        }
    }
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::InMemory => write!(f, "in_memory"),
            CacheType::Redis => write!(f, "redis"),
            CacheType::Disabled => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheType::InMemory),
            "redis" => Ok(CacheType::Redis),
            "" | "none" | "disabled" => Ok(CacheType::Disabled),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache type: {}. Valid types: memory, redis, none",
                s
            ))),
        }
    }
}

/// Configuration for cache factory
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Type of cache to create
    pub cache_type: CacheType,
    /// Redis URL (required for Redis type)
    pub redis_url: Option<String>,
    /// Key prefix for namespacing (Redis only)
    pub key_prefix: Option<String>,
    /// Lifetime of not-found placeholders
    pub placeholder_ttl: Duration,
    /// Maximum capacity (for in-memory cache)
    pub max_capacity: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            redis_url: None,
            key_prefix: None,
            placeholder_ttl: Duration::from_secs(600),
            max_capacity: Some(10_000),
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration for in-memory cache
    pub fn in_memory() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            ..Default::default()
        }
    }

    /// Creates a new configuration for Redis cache
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            cache_type: CacheType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Creates a configuration with caching turned off
    pub fn disabled() -> Self {
        Self {
            cache_type: CacheType::Disabled,
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the placeholder TTL
    pub fn with_placeholder_ttl(mut self, ttl: Duration) -> Self {
        self.placeholder_ttl = ttl;
        self
    }

    /// Sets the maximum capacity (in-memory only)
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }
}

/// Factory for creating cache instances
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    /// Creates a new cache factory
    pub fn new() -> Self {
        Self
    }

    /// Creates a cache instance based on configuration
    ///
    /// Returns `None` when caching is disabled.
    pub async fn create(
        &self,
        config: &CacheConfig,
    ) -> Result<Option<Arc<dyn Cache>>, DomainError> {
        match config.cache_type {
            CacheType::InMemory => {
                let mut in_memory_config = InMemoryCacheConfig::default()
                    .with_placeholder_ttl(config.placeholder_ttl);

                if let Some(capacity) = config.max_capacity {
                    in_memory_config = in_memory_config.with_max_capacity(capacity);
                }

                info!(
                    max_capacity = in_memory_config.max_capacity,
                    "Using in-memory cache"
                );
                Ok(Some(Arc::new(InMemoryCache::with_config(in_memory_config))))
            }
            CacheType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for Redis cache type")
                })?;

                let mut redis_config =
                    RedisCacheConfig::new(url).with_placeholder_ttl(config.placeholder_ttl);

                if let Some(prefix) = &config.key_prefix {
                    redis_config = redis_config.with_key_prefix(prefix.clone());
                }

                let cache = RedisCache::new(redis_config).await?;
                info!("Using Redis cache");
                Ok(Some(Arc::new(cache)))
            }
            CacheType::Disabled => {
                info!("Caching disabled");
                Ok(None)
            }
        }
    }
}
