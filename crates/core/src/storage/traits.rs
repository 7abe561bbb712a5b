use async_trait::async_trait;

use super::error::StoreResult;
use super::item::{Item, PrimaryKey};
use super::query::{QueryPage, QueryRequest};
use super::transaction::WriteBatch;

/// A partition/sort-key addressed item store with secondary indexes and
/// multi-item conditional transactions.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Gets an item by its primary key.
    async fn get_item(&self, key: &PrimaryKey) -> StoreResult<Option<Item>>;

    /// Gets several items by primary key. Missing keys are skipped; the
    /// result order is unspecified.
    async fn batch_get_items(&self, keys: &[PrimaryKey]) -> StoreResult<Vec<Item>>;

    /// Reads one page from a secondary index.
    async fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage>;

    /// Commits every operation of the batch or none of them.
    ///
    /// A precondition failure cancels the whole batch and is reported as
    /// [`super::StoreError::TransactionCanceled`] with one outcome per
    /// operation.
    async fn transact_write(&self, batch: &WriteBatch) -> StoreResult<()>;
}
