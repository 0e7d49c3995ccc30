//! Document operations.
//!
//! `DocumentService` is the only place that enforces "one document per
//! (type, identifier)". It does so with check-then-insert sequences against
//! the store; the store's own unique index catches anything that slips
//! between the check and the insert.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::codec::{NewRecord, RecordPatch};
use crate::error::{DocumentError, DocumentResult};
use crate::models::{Document, NewDocument};
use crate::router::{CollectionHandle, CollectionRouter};
use crate::store::DocumentStore;

pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    router: CollectionRouter,
}

/// Items of a batch create that route to the same collection.
struct BatchGroup {
    collection: CollectionHandle,
    /// The first `type` spelling seen for this collection, used in errors.
    doc_type: String,
    /// Positions of the group's items in the original batch.
    positions: Vec<usize>,
    items: Vec<NewDocument>,
}

impl BatchGroup {
    fn identifiers(&self) -> Vec<String> {
        self.items.iter().map(|d| d.identifier.clone()).collect()
    }

    /// Identifiers listed more than once, in order of their second appearance.
    fn repeated_identifiers(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut repeated = Vec::new();
        for item in &self.items {
            if !seen.insert(item.identifier.as_str()) && !repeated.contains(&item.identifier) {
                repeated.push(item.identifier.clone());
            }
        }
        repeated
    }
}

impl DocumentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_router(store, CollectionRouter::new())
    }

    pub fn with_router(store: Arc<dyn DocumentStore>, router: CollectionRouter) -> Self {
        Self { store, router }
    }

    pub fn router(&self) -> &CollectionRouter {
        &self.router
    }

    fn resolve(&self, doc_type: &str) -> CollectionHandle {
        self.router.resolve(Some(doc_type))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get_document(
        &self,
        identifier: &str,
        doc_type: &str,
    ) -> DocumentResult<Option<Document>> {
        let collection = self.resolve(doc_type);
        let record = self.store.find_one(&collection, identifier).await?;
        tracing::debug!(%collection, identifier, found = record.is_some(), "get document");
        Ok(record.map(|r| Document::from_record(r, doc_type)))
    }

    /// Fetches several documents with one store query.
    ///
    /// The result follows the order of `identifiers`; identifiers with no
    /// document are skipped and a repeated identifier is returned once.
    pub async fn get_documents(
        &self,
        doc_type: &str,
        identifiers: &[String],
    ) -> DocumentResult<Vec<Document>> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }

        let collection = self.resolve(doc_type);
        let records = self.store.find_many(&collection, identifiers).await?;

        let mut by_identifier: HashMap<String, Document> = HashMap::with_capacity(records.len());
        for record in records {
            by_identifier
                .entry(record.identifier.clone())
                .or_insert_with(|| Document::from_record(record, doc_type));
        }

        let documents: Vec<Document> = identifiers
            .iter()
            .filter_map(|identifier| by_identifier.remove(identifier))
            .collect();
        tracing::debug!(
            %collection,
            requested = identifiers.len(),
            found = documents.len(),
            "get documents"
        );
        Ok(documents)
    }

    /// Lists a whole collection, or the default collection when `doc_type` is `None`.
    pub async fn list_documents(&self, doc_type: Option<&str>) -> DocumentResult<Vec<Document>> {
        let collection = match doc_type {
            Some(t) => self.resolve(t),
            None => self.router.default_collection(),
        };
        let fallback_type = doc_type.unwrap_or_default();
        let records = self.store.find_all(&collection).await?;
        Ok(records
            .into_iter()
            .map(|r| Document::from_record(r, fallback_type))
            .collect())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub async fn create_document(&self, new: NewDocument) -> DocumentResult<Document> {
        let collection = self.resolve(&new.doc_type);

        if self
            .store
            .find_one(&collection, &new.identifier)
            .await?
            .is_some()
        {
            tracing::warn!(%collection, identifier = %new.identifier, "create rejected, identifier exists");
            return Err(DocumentError::AlreadyExists {
                identifier: new.identifier,
                doc_type: new.doc_type,
            });
        }

        let doc_type = new.doc_type.clone();
        let record = self
            .store
            .insert_one(&collection, NewRecord::from(new))
            .await?;
        tracing::info!(%collection, identifier = %record.identifier, id = %record.object_id, "document created");
        Ok(Document::from_record(record, &doc_type))
    }

    /// Creates every item or none of them.
    ///
    /// All groups are validated and checked against the store before the first
    /// insert. The returned documents follow the input order.
    pub async fn create_documents(&self, items: Vec<NewDocument>) -> DocumentResult<Vec<Document>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let total = items.len();
        let groups = self.group_by_collection(items);

        for group in &groups {
            let repeated = group.repeated_identifiers();
            if !repeated.is_empty() {
                return Err(DocumentError::RepeatedIdentifiers {
                    doc_type: group.doc_type.clone(),
                    identifiers: repeated,
                });
            }
        }

        for group in &groups {
            let requested = group.identifiers();
            let found = self.store.find_many(&group.collection, &requested).await?;
            if !found.is_empty() {
                let present: HashSet<&str> = found.iter().map(|r| r.identifier.as_str()).collect();
                let identifiers: Vec<String> = requested
                    .into_iter()
                    .filter(|id| present.contains(id.as_str()))
                    .collect();
                tracing::warn!(
                    collection = %group.collection,
                    existing = identifiers.len(),
                    "batch create rejected, identifiers exist"
                );
                return Err(DocumentError::DocumentsAlreadyExist {
                    doc_type: group.doc_type.clone(),
                    identifiers,
                });
            }
        }

        let mut created: Vec<Option<Document>> = vec![None; total];
        let mut inserted_groups = 0usize;
        for group in groups {
            let types: Vec<String> = group.items.iter().map(|d| d.doc_type.clone()).collect();
            let records: Vec<NewRecord> = group.items.into_iter().map(NewRecord::from).collect();

            let inserted = match self.store.insert_many(&group.collection, records).await {
                Ok(inserted) => inserted,
                Err(e) => {
                    if inserted_groups > 0 {
                        tracing::warn!(
                            collection = %group.collection,
                            inserted_groups,
                            "batch create failed after earlier groups were written: {}",
                            e
                        );
                    }
                    return Err(e.into());
                }
            };

            for ((record, position), doc_type) in
                inserted.into_iter().zip(group.positions).zip(types)
            {
                created[position] = Some(Document::from_record(record, &doc_type));
            }
            inserted_groups += 1;
        }

        tracing::info!(documents = total, groups = inserted_groups, "batch created");
        Ok(created.into_iter().flatten().collect())
    }

    /// Replaces the supplied fields of a document.
    ///
    /// Without `new_data` nothing is written and the current document is
    /// returned unchanged, so `None` always means the document does not exist.
    pub async fn update_document(
        &self,
        identifier: &str,
        doc_type: &str,
        new_data: Option<String>,
    ) -> DocumentResult<Option<Document>> {
        let patch = RecordPatch { data: new_data };
        if patch.is_empty() {
            return self.get_document(identifier, doc_type).await;
        }

        let collection = self.resolve(doc_type);
        let record = self
            .store
            .find_one_and_update(&collection, identifier, patch)
            .await?;
        if record.is_some() {
            tracing::info!(%collection, identifier, "document updated");
        }
        Ok(record.map(|r| Document::from_record(r, doc_type)))
    }

    /// Returns true if a document was removed.
    pub async fn delete_document(&self, identifier: &str, doc_type: &str) -> DocumentResult<bool> {
        let collection = self.resolve(doc_type);
        let removed = self.store.delete_one(&collection, identifier).await?;
        if removed > 0 {
            tracing::info!(%collection, identifier, "document deleted");
        }
        Ok(removed == 1)
    }

    /// Removes the listed documents with one store call and returns how many went.
    pub async fn delete_documents(
        &self,
        doc_type: &str,
        identifiers: &[String],
    ) -> DocumentResult<u64> {
        if identifiers.is_empty() {
            return Ok(0);
        }
        let collection = self.resolve(doc_type);
        let removed = self.store.delete_many(&collection, identifiers).await?;
        tracing::info!(%collection, requested = identifiers.len(), removed, "documents deleted");
        Ok(removed)
    }

    /// Splits a batch by target collection, keeping first-seen group order.
    fn group_by_collection(&self, items: Vec<NewDocument>) -> Vec<BatchGroup> {
        let mut groups: Vec<BatchGroup> = Vec::new();
        let mut index: HashMap<CollectionHandle, usize> = HashMap::new();

        for (position, item) in items.into_iter().enumerate() {
            let collection = self.resolve(&item.doc_type);
            let slot = *index.entry(collection.clone()).or_insert_with(|| {
                groups.push(BatchGroup {
                    collection,
                    doc_type: item.doc_type.clone(),
                    positions: Vec::new(),
                    items: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].positions.push(position);
            groups[slot].items.push(item);
        }
        groups
    }
}
