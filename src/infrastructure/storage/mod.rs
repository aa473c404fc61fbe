//! Storage infrastructure - Store implementations

mod factory;
mod in_memory;
mod postgres;

pub use factory::{RepositoryOptions, StoreBackend, StoreConfig, StoreFactory, StoreType};
pub use in_memory::{InMemoryStore, InMemoryTx};
pub use postgres::{connect_pool, PostgresConfig, PostgresStore};
