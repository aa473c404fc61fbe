//! Read-through repository: cache-aside reads with coalesced store fallback

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::storage::{QueryParams, Record, RecordKey, Store};
use crate::domain::{DomainError, EntityRepository};
use crate::infrastructure::cache::EntityCache;
use crate::infrastructure::coalesce::CoalescingGroup;
use crate::infrastructure::observability::{
    record_cache_lookup, record_cache_write_failure, record_store_fetch, CacheLookup,
};
use crate::infrastructure::storage::{InMemoryStore, InMemoryTx};

fn not_found<E: Record>(id: &E::Key) -> DomainError {
    DomainError::not_found(format!("{} '{}' not found", E::KIND, id))
}

fn require_key<E: Record>(id: &E::Key) -> Result<(), DomainError> {
    if id.is_unset() {
        return Err(DomainError::validation(format!(
            "{} id must not be empty or zero",
            E::KIND
        )));
    }
    Ok(())
}

/// Repository that serves reads from the cache and falls back to the store
///
/// With no cache configured every read goes straight to the store. Writes
/// always hit the store first and then drop the cached entry; cache failures
/// on either path are logged and never fail the operation.
pub struct ReadThroughRepository<E, S>
where
    E: Record,
    S: Store<E>,
{
    store: Arc<S>,
    cache: Option<EntityCache<E>>,
    group: CoalescingGroup<E>,
}

impl<E, S> std::fmt::Debug for ReadThroughRepository<E, S>
where
    E: Record,
    S: Store<E>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughRepository")
            .field("kind", &E::KIND)
            .field("store", &self.store)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<E, S> ReadThroughRepository<E, S>
where
    E: Record,
    S: Store<E> + 'static,
{
    pub fn new(store: Arc<S>, cache: Option<EntityCache<E>>) -> Self {
        Self {
            store,
            cache,
            group: CoalescingGroup::new(),
        }
    }

    /// Bounds each coalesced store read
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.group = self.group.with_fetch_timeout(timeout);
        self
    }

    /// The underlying store, for callers that open transactions
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    async fn invalidate(&self, id: &E::Key) {
        let Some(cache) = &self.cache else {
            return;
        };

        if let Err(e) = cache.del(id).await {
            warn!(kind = E::KIND, id = %id, error = %e, "Failed to invalidate cache entry");
            record_cache_write_failure(E::KIND, "del");
        }
    }

    /// Inserts a record inside a caller-owned transaction
    pub async fn create_by_tx(&self, tx: &mut S::Tx, record: E) -> Result<E::Key, DomainError> {
        if !E::Key::STORE_ASSIGNED {
            require_key::<E>(record.id())?;
        }

        let id = self.store.create_by_tx(tx, record).await?;

        if !E::Key::STORE_ASSIGNED {
            self.invalidate(&id).await;
        }

        Ok(id)
    }

    /// Deletes a record inside a caller-owned transaction
    pub async fn delete_by_tx(&self, tx: &mut S::Tx, id: &E::Key) -> Result<(), DomainError> {
        require_key::<E>(id)?;
        self.store.delete_by_tx(tx, id).await?;
        self.invalidate(id).await;
        Ok(())
    }

    /// Applies a patch inside a caller-owned transaction
    pub async fn update_by_tx(
        &self,
        tx: &mut S::Tx,
        id: &E::Key,
        patch: &E::Patch,
    ) -> Result<(), DomainError> {
        require_key::<E>(id)?;
        self.store.update_by_tx(tx, id, patch).await?;
        self.invalidate(id).await;
        Ok(())
    }

    /// Drops the cache entries of keys written by a transaction that has
    /// committed
    ///
    /// Reads between a staged write and its commit can cache the pre-commit
    /// record again, so callers run this once the commit succeeds.
    pub async fn invalidate_after_commit(&self, ids: &[E::Key]) {
        for id in ids {
            self.invalidate(id).await;
        }
    }
}

impl<E> ReadThroughRepository<E, InMemoryStore<E>>
where
    E: Record,
{
    /// Commits an in-memory transaction and invalidates every key it touched
    pub async fn commit(&self, tx: InMemoryTx<E>) -> Result<(), DomainError> {
        let keys = tx.keys();
        self.store.commit(tx)?;
        self.invalidate_after_commit(&keys).await;
        Ok(())
    }
}

/// Store read performed by the single fetcher of a coalescing window
async fn load_and_populate<E, S>(
    store: Arc<S>,
    cache: EntityCache<E>,
    id: E::Key,
) -> Result<E, DomainError>
where
    E: Record,
    S: Store<E>,
{
    record_store_fetch(E::KIND);

    match store.get_by_id(&id).await? {
        Some(record) => {
            if let Err(e) = cache.set(&id, Some(&record), cache.ttl()).await {
                warn!(kind = E::KIND, id = %id, error = %e, "Failed to cache record");
                record_cache_write_failure(E::KIND, "set");
            }
            Ok(record)
        }
        None => {
            if let Err(e) = cache.set_placeholder(&id).await {
                warn!(kind = E::KIND, id = %id, error = %e, "Failed to cache not-found placeholder");
                record_cache_write_failure(E::KIND, "placeholder");
            }
            Err(not_found::<E>(&id))
        }
    }
}

#[async_trait]
impl<E, S> EntityRepository<E> for ReadThroughRepository<E, S>
where
    E: Record,
    S: Store<E> + 'static,
{
    async fn create(&self, record: E) -> Result<E::Key, DomainError> {
        if !E::Key::STORE_ASSIGNED {
            require_key::<E>(record.id())?;
        }

        let id = self.store.create(record).await?;

        // A caller-chosen key may be reused after a delete and still carry a
        // placeholder from a lookup in between.
        if !E::Key::STORE_ASSIGNED {
            self.invalidate(&id).await;
        }

        Ok(id)
    }

    async fn delete_by_id(&self, id: &E::Key) -> Result<(), DomainError> {
        require_key::<E>(id)?;
        self.store.delete_by_id(id).await?;
        self.invalidate(id).await;
        Ok(())
    }

    async fn update_by_id(&self, id: &E::Key, patch: &E::Patch) -> Result<(), DomainError> {
        require_key::<E>(id)?;
        self.store.update_by_id(id, patch).await?;
        self.invalidate(id).await;
        Ok(())
    }

    async fn get_by_id(&self, id: &E::Key) -> Result<E, DomainError> {
        require_key::<E>(id)?;

        let Some(cache) = &self.cache else {
            return self
                .store
                .get_by_id(id)
                .await?
                .ok_or_else(|| not_found::<E>(id));
        };

        match cache.get(id).await {
            Ok(record) => {
                record_cache_lookup(E::KIND, CacheLookup::Hit);
                return Ok(record);
            }
            Err(e) if cache.is_placeholder_err(&e) => {
                record_cache_lookup(E::KIND, CacheLookup::Placeholder);
                debug!(kind = E::KIND, id = %id, "Placeholder hit, skipping store");
                return Err(not_found::<E>(id));
            }
            Err(e) if e.is_cache_miss() => {
                record_cache_lookup(E::KIND, CacheLookup::Miss);
            }
            Err(e) => return Err(e),
        }

        let key = cache.key(id);
        let store = Arc::clone(&self.store);
        let cache = cache.clone();
        let id = id.clone();

        self.group
            .run(&key, move || load_and_populate(store, cache, id))
            .await
    }

    async fn get_by_columns(&self, params: &QueryParams) -> Result<(Vec<E>, u64), DomainError> {
        params.validate(E::COLUMNS)?;
        self.store.get_by_columns(params).await
    }
}
