use async_trait::async_trait;

use crate::domain::storage::{QueryParams, Record};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Entity repository consumed by the HTTP handlers
///
/// `get_by_id` reports an absent record as `DomainError::NotFound`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EntityRepository<E>: Send + Sync
where
    E: Record,
{
    /// Creates a record and returns its key
    async fn create(&self, record: E) -> Result<E::Key, DomainError>;

    /// Deletes a record by key
    async fn delete_by_id(&self, id: &E::Key) -> Result<(), DomainError>;

    /// Applies a partial update to a record
    async fn update_by_id(&self, id: &E::Key, patch: &E::Patch) -> Result<(), DomainError>;

    /// Loads a record by key
    async fn get_by_id(&self, id: &E::Key) -> Result<E, DomainError>;

    /// Lists records matching the given filters, with the total match count
    async fn get_by_columns(&self, params: &QueryParams) -> Result<(Vec<E>, u64), DomainError>;
}
