//! Cache trait definition

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// Key/value cache with TTLs and a not-found placeholder
///
/// This trait uses JSON strings internally to be dyn-compatible.
/// Use the helper methods for typed get/set operations.
///
/// `get_raw` distinguishes two non-value outcomes: `DomainError::CacheMiss`
/// when the key is absent or expired, and `DomainError::CachePlaceholder` when
/// it holds the placeholder sentinel.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Gets a raw JSON value from the cache
    async fn get_raw(&self, key: &str) -> Result<String, DomainError>;

    /// Sets a raw JSON value in the cache with a TTL
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Gets several raw values; absent and placeholder keys are left out
    async fn multi_get_raw(&self, keys: &[String]) -> Result<HashMap<String, String>, DomainError>;

    /// Sets several raw values sharing one TTL
    async fn multi_set_raw(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), DomainError>;

    /// Deletes a value from the cache, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Marks a key as confirmed absent for the backend's placeholder TTL
    async fn set_placeholder(&self, key: &str) -> Result<(), DomainError>;

    /// Lifetime of placeholder entries written by this backend
    fn placeholder_ttl(&self) -> Duration;

    /// Returns true when an error from `get_raw` means "placeholder found"
    fn is_placeholder_err(&self, err: &DomainError) -> bool {
        err.is_placeholder()
    }
}

/// Extension trait providing typed get/set operations
pub trait CacheExt: Cache {
    /// Gets a typed value from the cache
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<V, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            let data = self.get_raw(key).await?;
            serde_json::from_str(&data).map_err(|e| {
                DomainError::cache(format!("Failed to deserialize cache value: {}", e))
            })
        }
    }

    /// Sets a typed value in the cache with a TTL
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::cache(format!("Failed to serialize cache value: {}", e))
            })?;
            self.set_raw(key, &data, ttl).await
        }
    }

    /// Gets multiple values at once, keyed by cache key
    ///
    /// Entries that fail to deserialize are treated like misses.
    fn multi_get<'a, V>(
        &'a self,
        keys: &'a [String],
    ) -> impl std::future::Future<Output = Result<HashMap<String, V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            let raw = self.multi_get_raw(keys).await?;

            Ok(raw
                .into_iter()
                .filter_map(|(key, data)| match serde_json::from_str(&data) {
                    Ok(value) => Some((key, value)),
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                        None
                    }
                })
                .collect())
        }
    }

    /// Sets multiple values at once
    fn multi_set<'a, V>(
        &'a self,
        entries: &'a [(String, &'a V)],
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let mut raw = Vec::with_capacity(entries.len());

            for (key, value) in entries {
                let data = serde_json::to_string(value).map_err(|e| {
                    DomainError::cache(format!("Failed to serialize cache value: {}", e))
                })?;
                raw.push((key.clone(), data));
            }

            self.multi_set_raw(&raw, ttl).await
        }
    }
}

// Blanket implementation for all types implementing Cache
impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::domain::cache::key::{is_placeholder_value, PLACEHOLDER};

    /// Mock cache for testing
    ///
    /// Entries never expire; the recorded TTL is available through `ttl_of`.
    #[derive(Debug)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, (String, Duration)>>,
        read_error: Mutex<Option<String>>,
        write_error: Mutex<Option<String>>,
        placeholder_ttl: Duration,
        writes: AtomicUsize,
    }

    impl Default for MockCache {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockCache {
        pub fn new() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                read_error: Mutex::new(None),
                write_error: Mutex::new(None),
                placeholder_ttl: Duration::from_secs(600),
                writes: AtomicUsize::new(0),
            }
        }

        pub fn with_entry<V: Serialize>(self, key: &str, value: &V, ttl: Duration) -> Self {
            let json = serde_json::to_string(value).unwrap();
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (json, ttl));
            self
        }

        pub fn with_placeholder(self, key: &str) -> Self {
            let ttl = self.placeholder_ttl;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (PLACEHOLDER.to_string(), ttl));
            self
        }

        /// Fails every read with a backend error
        pub fn with_read_error(self, error: impl Into<String>) -> Self {
            *self.read_error.lock().unwrap() = Some(error.into());
            self
        }

        /// Fails every write (set, placeholder, delete) with a backend error
        pub fn with_write_error(self, error: impl Into<String>) -> Self {
            *self.write_error.lock().unwrap() = Some(error.into());
            self
        }

        pub fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }

        pub fn raw(&self, key: &str) -> Option<String> {
            self.entries
                .lock()
                .unwrap()
                .get(key)
                .map(|(value, _)| value.clone())
        }

        pub fn ttl_of(&self, key: &str) -> Option<Duration> {
            self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
        }

        /// Number of write attempts, failed ones included
        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn check_read(&self) -> Result<(), DomainError> {
            if let Some(error) = self.read_error.lock().unwrap().clone() {
                return Err(DomainError::cache(error));
            }
            Ok(())
        }

        fn check_write(&self) -> Result<(), DomainError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.write_error.lock().unwrap().clone() {
                return Err(DomainError::cache(error));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn get_raw(&self, key: &str) -> Result<String, DomainError> {
            self.check_read()?;
            let entries = self.entries.lock().unwrap();

            match entries.get(key) {
                Some((value, _)) if is_placeholder_value(value) => {
                    Err(DomainError::cache_placeholder(key))
                }
                Some((value, _)) => Ok(value.clone()),
                None => Err(DomainError::cache_miss(key)),
            }
        }

        async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
            self.check_write()?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
            Ok(())
        }

        async fn multi_get_raw(
            &self,
            keys: &[String],
        ) -> Result<HashMap<String, String>, DomainError> {
            self.check_read()?;
            let entries = self.entries.lock().unwrap();

            Ok(keys
                .iter()
                .filter_map(|key| {
                    entries
                        .get(key)
                        .filter(|(value, _)| !is_placeholder_value(value))
                        .map(|(value, _)| (key.clone(), value.clone()))
                })
                .collect())
        }

        async fn multi_set_raw(
            &self,
            entries: &[(String, String)],
            ttl: Duration,
        ) -> Result<(), DomainError> {
            self.check_write()?;
            let mut stored = self.entries.lock().unwrap();

            for (key, value) in entries {
                stored.insert(key.clone(), (value.clone(), ttl));
            }

            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            self.check_write()?;
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }

        async fn set_placeholder(&self, key: &str) -> Result<(), DomainError> {
            self.check_write()?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (PLACEHOLDER.to_string(), self.placeholder_ttl));
            Ok(())
        }

        fn placeholder_ttl(&self) -> Duration {
            self.placeholder_ttl
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_cache_set_get() {
            let cache = MockCache::new();
            cache
                .set("key1", &"value1", Duration::from_secs(60))
                .await
                .unwrap();

            let result: String = cache.get("key1").await.unwrap();
            assert_eq!(result, "value1");
        }

        #[tokio::test]
        async fn test_mock_cache_get_missing() {
            let cache = MockCache::new();

            let result: Result<String, _> = cache.get("missing").await;
            assert!(result.unwrap_err().is_cache_miss());
        }

        #[tokio::test]
        async fn test_mock_cache_placeholder() {
            let cache = MockCache::new();
            cache.set_placeholder("mob:9").await.unwrap();

            let err = cache.get::<String>("mob:9").await.unwrap_err();
            assert!(cache.is_placeholder_err(&err));
            assert_eq!(cache.ttl_of("mob:9"), Some(Duration::from_secs(600)));
        }

        #[tokio::test]
        async fn test_mock_cache_multi_get_skips_absent_and_placeholder() {
            let cache = MockCache::new()
                .with_entry("k1", &1, Duration::from_secs(60))
                .with_placeholder("k2");

            let keys = vec!["k1".to_string(), "k2".to_string(), "k3".to_string()];
            let found: HashMap<String, i32> = cache.multi_get(&keys).await.unwrap();

            assert_eq!(found.len(), 1);
            assert_eq!(found.get("k1"), Some(&1));
        }

        #[tokio::test]
        async fn test_mock_cache_with_write_error() {
            let cache = MockCache::new().with_write_error("Test error");

            let result = cache.set("key", &1, Duration::from_secs(1)).await;
            assert!(matches!(result, Err(DomainError::Cache { .. })));
            assert_eq!(cache.writes(), 1);
        }
    }
}
