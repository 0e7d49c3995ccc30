//! The narrow contract the document service needs from a store.

use async_trait::async_trait;

use crate::codec::{NewRecord, RecordPatch, StoredRecord};
use crate::error::StoreError;
use crate::router::CollectionHandle;

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-collection record storage.
///
/// Records are matched by their `identifier` field. Implementations assign the
/// native identity on insert and should reject a second record with the same
/// identifier in one collection with [`StoreError::DuplicateKey`]. Nothing here
/// is transactional across calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point lookup by identifier.
    async fn find_one(
        &self,
        collection: &CollectionHandle,
        identifier: &str,
    ) -> StoreResult<Option<StoredRecord>>;

    /// Multi-key lookup. Result order is unspecified.
    async fn find_many(
        &self,
        collection: &CollectionHandle,
        identifiers: &[String],
    ) -> StoreResult<Vec<StoredRecord>>;

    /// Every record in the collection, in insertion order.
    async fn find_all(&self, collection: &CollectionHandle) -> StoreResult<Vec<StoredRecord>>;

    async fn insert_one(
        &self,
        collection: &CollectionHandle,
        record: NewRecord,
    ) -> StoreResult<StoredRecord>;

    /// Inserts several records, returning them with their assigned identities
    /// in input order.
    async fn insert_many(
        &self,
        collection: &CollectionHandle,
        records: Vec<NewRecord>,
    ) -> StoreResult<Vec<StoredRecord>>;

    /// Merges `patch` into the record with `identifier` and returns the record
    /// as it is after the update.
    async fn find_one_and_update(
        &self,
        collection: &CollectionHandle,
        identifier: &str,
        patch: RecordPatch,
    ) -> StoreResult<Option<StoredRecord>>;

    /// Removes at most one record. Returns the number removed.
    async fn delete_one(&self, collection: &CollectionHandle, identifier: &str)
        -> StoreResult<u64>;

    /// Removes every record whose identifier is listed. Returns the number removed.
    async fn delete_many(
        &self,
        collection: &CollectionHandle,
        identifiers: &[String],
    ) -> StoreResult<u64>;
}
