use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::cache::{CacheConfig, CacheType};
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::storage::{PostgresConfig, StoreConfig, StoreType};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub cache: CacheSettings,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `memory` or `postgres`
    pub store: String,
    pub url: String,
    pub max_connections: u32,
}

/// Cache section; an unrecognised `cache_type` disables caching
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub cache_type: String,
    pub redis_url: String,
    pub key_prefix: Option<String>,
    pub max_capacity: u64,
    pub placeholder_ttl_secs: u64,
    pub mob_ttl_secs: u64,
    pub item_ttl_secs: u64,
    pub room_ttl_secs: u64,
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            store: "memory".to_string(),
            url: PostgresConfig::default().url,
            max_connections: 10,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_type: "memory".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            max_capacity: 10_000,
            placeholder_ttl_secs: 600,
            mob_ttl_secs: 300,
            item_ttl_secs: 300,
            room_ttl_secs: 300,
            fetch_timeout_ms: None,
        }
    }
}

impl DatabaseConfig {
    /// Resolves the store section; unknown store names are rejected
    pub fn store_config(&self) -> Result<StoreConfig, crate::domain::DomainError> {
        Ok(match self.store.parse::<StoreType>()? {
            StoreType::InMemory => StoreConfig::in_memory(),
            StoreType::Postgres => StoreConfig::postgres(
                PostgresConfig::new(&self.url).with_max_connections(self.max_connections),
            ),
        })
    }
}

impl CacheSettings {
    pub fn cache_config(&self) -> CacheConfig {
        let config = CacheConfig {
            cache_type: CacheType::from_selector(&self.cache_type),
            redis_url: Some(self.redis_url.clone()),
            ..CacheConfig::default()
        }
        .with_max_capacity(self.max_capacity)
        .with_placeholder_ttl(Duration::from_secs(self.placeholder_ttl_secs));

        match &self.key_prefix {
            Some(prefix) => config.with_key_prefix(prefix.clone()),
            None => config,
        }
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
