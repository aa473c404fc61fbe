//! Request coalescing for concurrent fetches of the same key
//!
//! The first caller for a key spawns the fetch; callers arriving while it is in
//! flight subscribe to the same shared future and receive a clone of its
//! result. The table lock is only held to look up or insert an entry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::domain::DomainError;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, DomainError>>>;

/// Keyed table of in-flight fetches
pub struct CoalescingGroup<V>
where
    V: Clone + Send + Sync + 'static,
{
    in_flight: Arc<Mutex<HashMap<String, SharedFetch<V>>>>,
    fetch_timeout: Option<Duration>,
}

impl<V> Clone for CoalescingGroup<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
            fetch_timeout: self.fetch_timeout,
        }
    }
}

impl<V> fmt::Debug for CoalescingGroup<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoalescingGroup")
            .field("in_flight", &self.in_flight_count())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl<V> Default for CoalescingGroup<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CoalescingGroup<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            fetch_timeout: None,
        }
    }

    /// Bounds each fetch; an elapsed fetch fails every waiter with a storage error
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Number of keys currently being fetched
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs `fetch` for `key` unless a fetch for it is already running
    ///
    /// The fetch runs on its own task, so it completes, and its table entry is
    /// released, even if every caller stops waiting.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> Result<V, DomainError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, DomainError>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match in_flight.get(key) {
                Some(existing) => {
                    debug!(key = %key, "Joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    let shared = self.spawn_fetch(key.to_string(), fetch());
                    in_flight.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    fn spawn_fetch<Fut>(&self, key: String, fetch: Fut) -> SharedFetch<V>
    where
        Fut: Future<Output = Result<V, DomainError>> + Send + 'static,
    {
        let table = Arc::clone(&self.in_flight);
        let timeout = self.fetch_timeout;
        let task_key = key.clone();

        // `run` holds the table lock until the entry is inserted, so this
        // removal always happens after the insert.
        let handle = tokio::spawn(async move {
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, fetch).await {
                    Ok(result) => result,
                    Err(_) => Err(DomainError::storage(format!(
                        "Fetch for '{}' timed out after {:?}",
                        task_key, limit
                    ))),
                },
                None => fetch.await,
            };

            table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&task_key);

            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(DomainError::internal(format!(
                    "Fetch for '{}' failed: {}",
                    key, e
                ))),
            }
        }
        .boxed()
        .shared()
    }
}
