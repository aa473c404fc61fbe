//! Store factory for runtime backend selection

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::storage::{Record, Store};
use crate::domain::{Cache, DomainError, EntityRepository};
use crate::infrastructure::cache::EntityCache;
use crate::infrastructure::repository::ReadThroughRepository;

use super::in_memory::InMemoryStore;
use super::postgres::{connect_pool, PostgresConfig, PostgresStore};

/// Supported store types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// In-memory store (for testing/development)
    InMemory,
    /// PostgreSQL store
    Postgres,
}

impl FromStr for StoreType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DomainError::configuration(format!(
                "Unknown store type '{}'",
                other
            ))),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub enum StoreConfig {
    InMemory,
    Postgres(PostgresConfig),
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn postgres(config: PostgresConfig) -> Self {
        Self::Postgres(config)
    }

    /// Creates a PostgreSQL configuration from a URL
    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres(PostgresConfig::new(url))
    }

    pub fn store_type(&self) -> StoreType {
        match self {
            Self::InMemory => StoreType::InMemory,
            Self::Postgres(_) => StoreType::Postgres,
        }
    }
}

/// Connected backend shared by every entity kind
#[derive(Debug, Clone)]
pub enum StoreBackend {
    InMemory,
    Postgres(PgPool),
}

impl StoreBackend {
    /// Opens the backend described by `config`
    pub async fn connect(config: &StoreConfig) -> Result<Self, DomainError> {
        match config {
            StoreConfig::InMemory => Ok(Self::InMemory),
            StoreConfig::Postgres(pg_config) => {
                let pool = connect_pool(pg_config).await?;
                info!("Connected to PostgreSQL");
                Ok(Self::Postgres(pool))
            }
        }
    }
}

/// Options applied to every repository the factory builds
#[derive(Debug, Clone, Default)]
pub struct RepositoryOptions {
    /// Backend shared by all kinds; `None` disables caching
    pub cache: Option<Arc<dyn Cache>>,
    /// Overrides the kind's default positive-entry TTL
    pub cache_ttl: Option<Duration>,
    pub fetch_timeout: Option<Duration>,
}

/// Factory for read-through repositories over the configured store
///
/// `create_repository` erases the store type for the HTTP layer. Callers that
/// open transactions build the concrete repository with `read_through_in_memory`
/// or `read_through_postgres`, which keep `begin`, the `*_by_tx` methods and
/// the post-commit invalidation hook reachable.
#[derive(Debug)]
pub struct StoreFactory;

impl StoreFactory {
    /// Builds the repository for one entity kind
    pub async fn create_repository<E: Record>(
        backend: &StoreBackend,
        options: &RepositoryOptions,
    ) -> Result<Arc<dyn EntityRepository<E>>, DomainError> {
        match backend {
            StoreBackend::InMemory => Ok(Arc::new(Self::read_through_in_memory::<E>(options))),
            StoreBackend::Postgres(pool) => Ok(Arc::new(
                Self::read_through_postgres::<E>(pool.clone(), options).await?,
            )),
        }
    }

    /// Read-through repository over a fresh in-memory store
    pub fn read_through_in_memory<E: Record>(
        options: &RepositoryOptions,
    ) -> ReadThroughRepository<E, InMemoryStore<E>> {
        Self::wrap(Arc::new(InMemoryStore::new()), options)
    }

    /// Read-through repository over PostgreSQL, creating the kind's table if needed
    pub async fn read_through_postgres<E: Record>(
        pool: PgPool,
        options: &RepositoryOptions,
    ) -> Result<ReadThroughRepository<E, PostgresStore<E>>, DomainError> {
        let store = PostgresStore::<E>::new(pool);
        store.ensure_schema().await?;
        Ok(Self::wrap(Arc::new(store), options))
    }

    fn wrap<E, S>(store: Arc<S>, options: &RepositoryOptions) -> ReadThroughRepository<E, S>
    where
        E: Record,
        S: Store<E> + 'static,
    {
        let cache = options.cache.as_ref().map(|cache| match options.cache_ttl {
            Some(ttl) => EntityCache::<E>::with_ttl(Arc::clone(cache), ttl),
            None => EntityCache::<E>::new(Arc::clone(cache)),
        });

        let repository = ReadThroughRepository::new(store, cache);
        match options.fetch_timeout {
            Some(timeout) => repository.with_fetch_timeout(timeout),
            None => repository,
        }
    }
}
