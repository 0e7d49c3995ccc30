//! In-process document store.
//!
//! Holds each collection as an insertion-ordered `Vec` behind one lock. Used
//! by tests and by `serve --memory`; contents are lost when the process exits.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::codec::{NewRecord, RecordPatch, StoredRecord};
use crate::error::StoreError;
use crate::router::CollectionHandle;
use crate::store::{DocumentStore, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a record as-is, bypassing identity assignment and the unique
    /// identifier check. Lets tests seed legacy or partial records.
    pub fn insert_raw(&self, collection: &CollectionHandle, record: StoredRecord) {
        self.collections
            .write()
            .entry(collection.name().to_string())
            .or_default()
            .push(record);
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &CollectionHandle) -> usize {
        self.collections
            .read()
            .get(collection.name())
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &CollectionHandle) -> bool {
        self.len(collection) == 0
    }

    fn new_object_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: &CollectionHandle,
        identifier: &str,
    ) -> StoreResult<Option<StoredRecord>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection.name())
            .and_then(|records| records.iter().find(|r| r.identifier == identifier))
            .cloned())
    }

    async fn find_many(
        &self,
        collection: &CollectionHandle,
        identifiers: &[String],
    ) -> StoreResult<Vec<StoredRecord>> {
        let wanted: HashSet<&str> = identifiers.iter().map(String::as_str).collect();
        let collections = self.collections.read();
        Ok(collections
            .get(collection.name())
            .map(|records| {
                records
                    .iter()
                    .filter(|r| wanted.contains(r.identifier.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_all(&self, collection: &CollectionHandle) -> StoreResult<Vec<StoredRecord>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection.name())
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_one(
        &self,
        collection: &CollectionHandle,
        record: NewRecord,
    ) -> StoreResult<StoredRecord> {
        let mut inserted = self.insert_many(collection, vec![record]).await?;
        inserted
            .pop()
            .ok_or_else(|| StoreError::Backend("insert returned no record".to_string()))
    }

    async fn insert_many(
        &self,
        collection: &CollectionHandle,
        records: Vec<NewRecord>,
    ) -> StoreResult<Vec<StoredRecord>> {
        let mut collections = self.collections.write();
        let existing = collections.entry(collection.name().to_string()).or_default();

        // A rejected batch leaves the collection untouched.
        {
            let mut seen: HashSet<&str> =
                existing.iter().map(|r| r.identifier.as_str()).collect();
            for record in &records {
                if !seen.insert(record.identifier.as_str()) {
                    return Err(StoreError::DuplicateKey {
                        collection: collection.name().to_string(),
                        identifier: record.identifier.clone(),
                    });
                }
            }
        }

        let inserted: Vec<StoredRecord> = records
            .into_iter()
            .map(|record| StoredRecord::from_insert(Self::new_object_id(), record))
            .collect();
        existing.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn find_one_and_update(
        &self,
        collection: &CollectionHandle,
        identifier: &str,
        patch: RecordPatch,
    ) -> StoreResult<Option<StoredRecord>> {
        let mut collections = self.collections.write();
        let record = collections
            .get_mut(collection.name())
            .and_then(|records| records.iter_mut().find(|r| r.identifier == identifier));

        Ok(record.map(|record| {
            if let Some(data) = patch.data {
                record.data = Some(data);
            }
            record.clone()
        }))
    }

    async fn delete_one(
        &self,
        collection: &CollectionHandle,
        identifier: &str,
    ) -> StoreResult<u64> {
        let mut collections = self.collections.write();
        let Some(records) = collections.get_mut(collection.name()) else {
            return Ok(0);
        };
        match records.iter().position(|r| r.identifier == identifier) {
            Some(index) => {
                records.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(
        &self,
        collection: &CollectionHandle,
        identifiers: &[String],
    ) -> StoreResult<u64> {
        let doomed: HashSet<&str> = identifiers.iter().map(String::as_str).collect();
        let mut collections = self.collections.write();
        let Some(records) = collections.get_mut(collection.name()) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|r| !doomed.contains(r.identifier.as_str()));
        Ok((before - records.len()) as u64)
    }
}
