//! Persistence store trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::Record;
use super::query::QueryParams;

/// Persistence store for one record kind
///
/// The store is the source of truth. Transaction handles (`Tx`) are owned by
/// the caller; the `*_by_tx` methods only enlist in them.
#[async_trait]
pub trait Store<E>: Send + Sync + Debug
where
    E: Record,
{
    /// Caller-managed transaction handle
    type Tx: Send;

    /// Inserts a record and returns its key
    ///
    /// Store-assigned kinds always receive a freshly generated key; any id set
    /// on the record is ignored.
    async fn create(&self, record: E) -> Result<E::Key, DomainError>;

    /// Deletes a record; deleting a missing key is not an error
    async fn delete_by_id(&self, id: &E::Key) -> Result<(), DomainError>;

    /// Applies the fields set in `patch`; `NotFound` when no record matched
    async fn update_by_id(&self, id: &E::Key, patch: &E::Patch) -> Result<(), DomainError>;

    /// Loads a record by key
    async fn get_by_id(&self, id: &E::Key) -> Result<Option<E>, DomainError>;

    /// Returns one page of matching records and the total match count
    ///
    /// The total is zero when counting is disabled through the sort field.
    async fn get_by_columns(&self, params: &QueryParams) -> Result<(Vec<E>, u64), DomainError>;

    /// Inserts a record inside a caller-owned transaction
    async fn create_by_tx(&self, tx: &mut Self::Tx, record: E) -> Result<E::Key, DomainError>;

    /// Deletes a record inside a caller-owned transaction
    async fn delete_by_tx(&self, tx: &mut Self::Tx, id: &E::Key) -> Result<(), DomainError>;

    /// Applies a patch inside a caller-owned transaction
    async fn update_by_tx(
        &self,
        tx: &mut Self::Tx,
        id: &E::Key,
        patch: &E::Patch,
    ) -> Result<(), DomainError>;
}
