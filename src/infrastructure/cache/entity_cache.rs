//! Typed cache adapter binding a backend to one entity kind

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::cache::{namespaced_key, Cache, CacheExt};
use crate::domain::storage::{Record, RecordKey};
use crate::domain::DomainError;

/// Entity-kind view over a cache backend
///
/// Keys are `E::CACHE_PREFIX` followed by the id's string form, e.g. `mob:42`.
pub struct EntityCache<E: Record> {
    cache: Arc<dyn Cache>,
    ttl: Duration,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Record> Clone for EntityCache<E> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            ttl: self.ttl,
            _marker: PhantomData,
        }
    }
}

impl<E: Record> std::fmt::Debug for EntityCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("kind", &E::KIND)
            .field("ttl", &self.ttl)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<E: Record> EntityCache<E> {
    /// Creates an adapter using the kind's default TTL
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::with_ttl(cache, E::CACHE_TTL)
    }

    /// Creates an adapter with an explicit positive-entry TTL
    pub fn with_ttl(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            _marker: PhantomData,
        }
    }

    /// Lifetime used for positive entries written by the repository
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Builds the namespaced key for an id
    pub fn key(&self, id: &E::Key) -> String {
        namespaced_key(E::CACHE_PREFIX, id)
    }

    /// Caches a record
    ///
    /// Writing no record, or a record under an unset id, is skipped silently.
    pub async fn set(&self, id: &E::Key, record: Option<&E>, ttl: Duration) -> Result<(), DomainError> {
        let Some(record) = record else {
            return Ok(());
        };

        if id.is_unset() {
            return Ok(());
        }

        self.cache.set(&self.key(id), record, ttl).await
    }

    /// Reads a record; `CacheMiss` and `CachePlaceholder` pass through unchanged
    pub async fn get(&self, id: &E::Key) -> Result<E, DomainError> {
        self.cache.get(&self.key(id)).await
    }

    /// Reads several records, returning only the ids that were found
    pub async fn multi_get(&self, ids: &[E::Key]) -> Result<HashMap<E::Key, E>, DomainError> {
        let keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        let mut found: HashMap<String, E> = self.cache.multi_get(&keys).await?;

        Ok(ids
            .iter()
            .zip(keys.iter())
            .filter_map(|(id, key)| found.remove(key).map(|record| (id.clone(), record)))
            .collect())
    }

    /// Caches several records sharing one TTL; records with unset ids are skipped
    pub async fn multi_set(&self, records: &[E], ttl: Duration) -> Result<(), DomainError> {
        let entries: Vec<(String, &E)> = records
            .iter()
            .filter(|record| !record.id().is_unset())
            .map(|record| (self.key(record.id()), record))
            .collect();

        if entries.is_empty() {
            return Ok(());
        }

        self.cache.multi_set(&entries, ttl).await
    }

    /// Removes the entry for an id, positive or placeholder
    pub async fn del(&self, id: &E::Key) -> Result<(), DomainError> {
        self.cache.delete(&self.key(id)).await.map(|_| ())
    }

    /// Marks an id as confirmed absent
    pub async fn set_placeholder(&self, id: &E::Key) -> Result<(), DomainError> {
        self.cache.set_placeholder(&self.key(id)).await
    }

    /// Returns true when `err` reports a placeholder hit
    pub fn is_placeholder_err(&self, err: &DomainError) -> bool {
        self.cache.is_placeholder_err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCache;
    use crate::domain::{Mob, Room};
    use crate::infrastructure::cache::InMemoryCache;

    fn mob_cache() -> (Arc<MockCache>, EntityCache<Mob>) {
        let backend = Arc::new(MockCache::new());
        let cache = EntityCache::new(backend.clone() as Arc<dyn Cache>);
        (backend, cache)
    }

    #[test]
    fn test_key_scheme() {
        let (_, mobs) = mob_cache();
        let rooms: EntityCache<Room> = EntityCache::new(Arc::new(MockCache::new()));

        assert_eq!(mobs.key(&42), "mob:42");
        assert_eq!(rooms.key(&"room-1".to_string()), "room:room-1");
    }

    #[test]
    fn test_default_ttl_comes_from_kind() {
        let (_, mobs) = mob_cache();
        assert_eq!(mobs.ttl(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (backend, mobs) = mob_cache();
        let mob = Mob::new("rat", "Rat").with_id(7);

        mobs.set(&7, Some(&mob), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(mobs.get(&7).await.unwrap(), mob);
        assert_eq!(backend.ttl_of("mob:7"), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_set_skips_missing_record_and_unset_id() {
        let (backend, mobs) = mob_cache();
        let mob = Mob::new("rat", "Rat");

        mobs.set(&3, None, Duration::from_secs(60)).await.unwrap();
        mobs.set(&0, Some(&mob), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(backend.writes(), 0);
        assert!(!backend.contains("mob:0"));

        let rooms: EntityCache<Room> = EntityCache::new(backend.clone() as Arc<dyn Cache>);
        rooms
            .set(&String::new(), Some(&Room::new("", "Nowhere")), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test]
    async fn test_get_propagates_miss_and_placeholder() {
        let (_, mobs) = mob_cache();

        assert!(mobs.get(&1).await.unwrap_err().is_cache_miss());

        mobs.set_placeholder(&1).await.unwrap();
        let err = mobs.get(&1).await.unwrap_err();
        assert!(mobs.is_placeholder_err(&err));
    }

    #[tokio::test]
    async fn test_multi_get_returns_found_subset() {
        let cache = Arc::new(InMemoryCache::new());
        let mobs: EntityCache<Mob> = EntityCache::new(cache);
        let records = vec![Mob::new("a", "A").with_id(1), Mob::new("b", "B").with_id(2)];

        mobs.multi_set(&records, Duration::from_secs(60))
            .await
            .unwrap();
        mobs.set_placeholder(&3).await.unwrap();

        let found = mobs.multi_get(&[1, 2, 3, 4]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[&2].mob_id, "b");
        assert!(!found.contains_key(&3));
        assert!(!found.contains_key(&4));
    }

    #[tokio::test]
    async fn test_multi_set_skips_unset_ids() {
        let (backend, mobs) = mob_cache();
        let records = vec![Mob::new("a", "A")];

        mobs.multi_set(&records, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test]
    async fn test_del_removes_entry() {
        let (backend, mobs) = mob_cache();

        mobs.set_placeholder(&9).await.unwrap();
        mobs.del(&9).await.unwrap();
        assert!(!backend.contains("mob:9"));

        // deleting an absent key is fine
        mobs.del(&9).await.unwrap();
    }
}
