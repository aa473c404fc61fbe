//! World Data Service
//!
//! CRUD API for the mobs, items and rooms of a game world, with a
//! read-through cache in front of the store:
//! - Concurrent misses for one key share a single store read
//! - Confirmed-absent keys are remembered with a short-lived placeholder
//! - Writes go to the store first, then drop the cached entry

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::time::Duration;

use api::state::AppState;
use infrastructure::cache::CacheFactory;
use infrastructure::storage::{RepositoryOptions, StoreBackend, StoreFactory};
use tracing::info;

/// Create the application state with the default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let cache_config = config.cache.cache_config();
    let cache = CacheFactory::new().create(&cache_config).await?;

    let store_config = config.database.store_config()?;
    let backend = StoreBackend::connect(&store_config).await?;

    let options = |ttl_secs: u64| RepositoryOptions {
        cache: cache.clone(),
        cache_ttl: Some(Duration::from_secs(ttl_secs)),
        fetch_timeout: config.cache.fetch_timeout(),
    };

    let state = AppState::new(
        StoreFactory::create_repository(&backend, &options(config.cache.mob_ttl_secs)).await?,
        StoreFactory::create_repository(&backend, &options(config.cache.item_ttl_secs)).await?,
        StoreFactory::create_repository(&backend, &options(config.cache.room_ttl_secs)).await?,
    );

    info!(
        store = ?store_config.store_type(),
        cache = %cache_config.cache_type,
        "Application state initialized"
    );

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Item, Mob};

    #[tokio::test]
    async fn test_default_state_round_trip() {
        let state = create_app_state().await.unwrap();

        let id = state.mobs.create(Mob::new("rat", "Rat")).await.unwrap();
        assert_eq!(state.mobs.get_by_id(&id).await.unwrap().mob_name, "Rat");

        let missing = state.items.get_by_id(&404).await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_disabled_cache_still_serves() {
        let mut config = AppConfig::default();
        config.cache.cache_type = "none".to_string();

        let state = create_app_state_with_config(&config).await.unwrap();
        let id = state.items.create(Item::new("sword", "Sword")).await.unwrap();

        assert_eq!(state.items.get_by_id(&id).await.unwrap().item_id, "sword");
    }
}
