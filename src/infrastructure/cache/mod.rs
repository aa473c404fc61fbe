//! Cache infrastructure - Cache implementations

mod entity_cache;
mod factory;
mod in_memory;
mod redis;

pub use entity_cache::EntityCache;
pub use factory::{CacheConfig, CacheFactory, CacheType};
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use redis::{RedisCache, RedisCacheConfig};
