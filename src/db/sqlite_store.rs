use async_trait::async_trait;
use docroute_core::store::StoreResult;
use docroute_core::{
    CollectionHandle, DocumentStore, NewRecord, RecordPatch, StoreError, StoredRecord,
    DEFAULT_COLLECTION,
};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::RwLock;
use uuid::Uuid;

/// SQLite has a bound-parameter limit per statement; multi-key queries are
/// split into chunks of this size.
const MAX_KEYS_PER_QUERY: usize = 500;

/// Document store backed by SQLite, one table per collection.
///
/// Every table carries a unique index on `identifier`, so two inserts that
/// race past the service's existence check cannot both succeed.
pub struct SqliteStore {
    pool: SqlitePool,
    /// Tables known to exist. A poisoned lock only costs a redundant
    /// `CREATE TABLE IF NOT EXISTS`.
    ready: RwLock<HashSet<String>>,
}

// Row type for record queries
#[derive(sqlx::FromRow)]
struct RecordRow {
    #[sqlx(rename = "_id")]
    object_id: String,
    identifier: String,
    #[sqlx(rename = "type")]
    doc_type: Option<String>,
    data: Option<String>,
}

impl From<RecordRow> for StoredRecord {
    fn from(row: RecordRow) -> Self {
        Self {
            object_id: row.object_id,
            identifier: row.identifier,
            doc_type: row.doc_type,
            data: row.data,
        }
    }
}

const RECORD_COLUMNS: &str = "_id, identifier, type, data";

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Maps a failed insert, turning unique violations into `DuplicateKey`.
fn insert_error(e: sqlx::Error, collection: &CollectionHandle, identifier: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateKey {
                collection: collection.name().to_string(),
                identifier: identifier.to_string(),
            };
        }
    }
    backend(e)
}

/// `?, ?, ?` for `n` parameters.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Table backing a collection.
///
/// Collection names share SQLite's schema namespace with `sqlite_*` objects,
/// the `_sqlx_migrations` table and the store's own indexes, so every table
/// gets a `coll_` prefix and every index an `ix_coll_` prefix.
fn table_name(collection: &CollectionHandle) -> String {
    format!("coll_{}", collection.name())
}

fn index_name(collection: &CollectionHandle) -> String {
    format!("ix_coll_{}", collection.name())
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        let mut ready = HashSet::new();
        ready.insert(DEFAULT_COLLECTION.to_string());
        Self {
            pool,
            ready: RwLock::new(ready),
        }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the table for a collection the first time it is used.
    ///
    /// Collection names come out of the router sanitized to alphanumerics and
    /// `_`, which is what makes quoting them into DDL safe.
    async fn ensure_collection(&self, collection: &CollectionHandle) -> StoreResult<()> {
        let name = collection.name();
        let table = table_name(collection);
        let index = index_name(collection);
        let known = self
            .ready
            .read()
            .map(|ready| ready.contains(name))
            .unwrap_or(false);
        if known {
            return Ok(());
        }

        let create_table = format!(
            r#"CREATE TABLE IF NOT EXISTS "{table}" (
                _id TEXT PRIMARY KEY,
                identifier TEXT NOT NULL,
                type TEXT,
                data TEXT
            )"#
        );
        let create_index = format!(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "{index}" ON "{table}" (identifier)"#
        );

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(&create_table)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        sqlx::query(&create_index)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        tracing::info!(collection = name, "created collection table");
        if let Ok(mut ready) = self.ready.write() {
            ready.insert(name.to_string());
        }
        Ok(())
    }

    fn new_object_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find_one(
        &self,
        collection: &CollectionHandle,
        identifier: &str,
    ) -> StoreResult<Option<StoredRecord>> {
        self.ensure_collection(collection).await?;

        let sql = format!(
            r#"SELECT {RECORD_COLUMNS} FROM "{}" WHERE identifier = ? LIMIT 1"#,
            table_name(collection)
        );
        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(StoredRecord::from))
    }

    async fn find_many(
        &self,
        collection: &CollectionHandle,
        identifiers: &[String],
    ) -> StoreResult<Vec<StoredRecord>> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_collection(collection).await?;

        let mut records = Vec::new();
        for chunk in identifiers.chunks(MAX_KEYS_PER_QUERY) {
            let sql = format!(
                r#"SELECT {RECORD_COLUMNS} FROM "{}" WHERE identifier IN ({})"#,
                table_name(collection),
                placeholders(chunk.len())
            );
            let mut query = sqlx::query_as::<_, RecordRow>(&sql);
            for identifier in chunk {
                query = query.bind(identifier);
            }
            let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
            records.extend(rows.into_iter().map(StoredRecord::from));
        }
        Ok(records)
    }

    async fn find_all(&self, collection: &CollectionHandle) -> StoreResult<Vec<StoredRecord>> {
        self.ensure_collection(collection).await?;

        let sql = format!(
            r#"SELECT {RECORD_COLUMNS} FROM "{}" ORDER BY rowid"#,
            table_name(collection)
        );
        let rows: Vec<RecordRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        Ok(rows.into_iter().map(StoredRecord::from).collect())
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
        self.ensure_collection(collection).await?;

        let sql = format!(
            r#"INSERT INTO "{}" (_id, identifier, type, data) VALUES (?, ?, ?, ?)"#,
            table_name(collection)
        );

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut inserted = Vec::with_capacity(records.len());
        for record in records {
            let object_id = Self::new_object_id();
            sqlx::query(&sql)
                .bind(&object_id)
                .bind(&record.identifier)
                .bind(&record.doc_type)
                .bind(&record.data)
                .execute(&mut *tx)
                .await
                .map_err(|e| insert_error(e, collection, &record.identifier))?;
            inserted.push(StoredRecord::from_insert(object_id, record));
        }
        tx.commit().await.map_err(backend)?;

        Ok(inserted)
    }

    async fn find_one_and_update(
        &self,
        collection: &CollectionHandle,
        identifier: &str,
        patch: RecordPatch,
    ) -> StoreResult<Option<StoredRecord>> {
        self.ensure_collection(collection).await?;

        let Some(data) = patch.data else {
            return self.find_one(collection, identifier).await;
        };

        let sql = format!(
            r#"UPDATE "{}" SET data = ? WHERE identifier = ? RETURNING {RECORD_COLUMNS}"#,
            table_name(collection)
        );
        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(&data)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(StoredRecord::from))
    }

    async fn delete_one(
        &self,
        collection: &CollectionHandle,
        identifier: &str,
    ) -> StoreResult<u64> {
        self.ensure_collection(collection).await?;

        let sql = format!(
            r#"DELETE FROM "{table}" WHERE rowid = (SELECT rowid FROM "{table}" WHERE identifier = ? LIMIT 1)"#,
            table = table_name(collection)
        );
        let result = sqlx::query(&sql)
            .bind(identifier)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected())
    }

    async fn delete_many(
        &self,
        collection: &CollectionHandle,
        identifiers: &[String],
    ) -> StoreResult<u64> {
        if identifiers.is_empty() {
            return Ok(0);
        }
        self.ensure_collection(collection).await?;

        let mut removed = 0;
        for chunk in identifiers.chunks(MAX_KEYS_PER_QUERY) {
            let sql = format!(
                r#"DELETE FROM "{}" WHERE identifier IN ({})"#,
                table_name(collection),
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for identifier in chunk {
                query = query.bind(identifier);
            }
            removed += query
                .execute(&self.pool)
                .await
                .map_err(backend)?
                .rows_affected();
        }
        Ok(removed)
    }
}
