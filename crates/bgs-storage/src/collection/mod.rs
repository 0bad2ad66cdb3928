//! Typed document collections
//!
//! A [`Collection`] is a handle onto one named collection of a
//! [`DocumentStore`]. Every mutation runs in a single redb write transaction
//! covering the document, its index entries, the running statistics and, for
//! capped collections, the trim step that evicts the oldest documents. The
//! capacity bounds therefore hold at every commit.
//!
//! Capped collections only accept inserts. Uncapped collections additionally
//! support [`replace_one`](Collection::replace_one),
//! [`delete_one`](Collection::delete_one) and
//! [`upsert_one`](Collection::upsert_one).

pub(crate) mod document;
mod index;
pub(crate) mod keys;
mod options;
mod query;

pub use index::{ID_FIELD, IndexField, IndexSpec, SortOrder};
pub use options::{
    CollectionMeta, CollectionOptions, CollectionStats, MAX_COLLECTION_NAME_LEN,
    validate_collection_name,
};
pub use query::Query;

use std::fmt::Display;
use std::marker::PhantomData;

use redb::{ReadableTable, Table, WriteTransaction};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info, instrument, trace};

use crate::error::StorageError;
use crate::quota::CapacityPolicy;
use crate::tables::{
    CATALOG, COLLECTION_STATS, DOCUMENTS, DocumentStore, INDEX_ENTRIES, read_meta, read_stats,
    write_meta, write_stats,
};
use document::{EncodedDocument, decode, decode_value, encode};
use keys::{document_bounds, document_key, id_from_document_key, index_entry_key, index_prefix};

/// Store-assigned identity of a document
///
/// Ids increase strictly with insertion order within a collection, so they
/// double as the recency component of the log indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl DocumentId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document together with its id
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub id: DocumentId,
    pub document: T,
}

/// Scan direction for insertion-order reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Oldest first
    Forward,
    /// Newest first
    #[default]
    Reverse,
}

/// Handle onto one collection of a [`DocumentStore`]
pub struct Collection<T> {
    store: DocumentStore,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).finish()
    }
}

type StatsTable<'txn> = Table<'txn, &'static str, &'static [u8]>;
type DocumentTable<'txn> = Table<'txn, &'static [u8], &'static [u8]>;
type IndexTable<'txn> = Table<'txn, &'static [u8], u64>;

/// Tables touched by a document mutation, opened from one write transaction
struct WriteTables<'txn> {
    stats: StatsTable<'txn>,
    documents: DocumentTable<'txn>,
    index_entries: IndexTable<'txn>,
}

impl<'txn> WriteTables<'txn> {
    fn open(txn: &'txn WriteTransaction) -> Result<Self, StorageError> {
        Ok(Self {
            stats: txn.open_table(COLLECTION_STATS)?,
            documents: txn.open_table(DOCUMENTS)?,
            index_entries: txn.open_table(INDEX_ENTRIES)?,
        })
    }

    fn load_stats(&self, collection: &str) -> Result<CollectionStats, StorageError> {
        Ok(read_stats(&self.stats, collection)?.unwrap_or_else(CollectionStats::fresh))
    }

    fn add_index_entries(
        &mut self,
        meta: &CollectionMeta,
        id: u64,
        value: &Value,
    ) -> Result<(), StorageError> {
        for spec in &meta.indexes {
            let key = index_entry_key(&meta.name, &spec.name(), &spec.encode_document(id, value), id);
            self.index_entries.insert(key.as_slice(), id)?;
        }
        Ok(())
    }

    fn remove_index_entries(
        &mut self,
        meta: &CollectionMeta,
        id: u64,
        value: &Value,
    ) -> Result<(), StorageError> {
        for spec in &meta.indexes {
            let key = index_entry_key(&meta.name, &spec.name(), &spec.encode_document(id, value), id);
            self.index_entries.remove(key.as_slice())?;
        }
        Ok(())
    }

    fn stored_bytes(&self, collection: &str, id: u64) -> Result<Option<Vec<u8>>, StorageError> {
        let key = document_key(collection, id);
        Ok(self.documents.get(key.as_slice())?.map(|v| v.value().to_vec()))
    }

    /// Remove the document with the smallest id; false if the collection is empty
    fn evict_oldest(
        &mut self,
        meta: &CollectionMeta,
        stats: &mut CollectionStats,
    ) -> Result<bool, StorageError> {
        let (start, end) = document_bounds(&meta.name);
        let oldest = {
            let mut range = self.documents.range(start.as_slice()..=end.as_slice())?;
            match range.next() {
                Some(entry) => {
                    let (key, value) = entry?;
                    Some((key.value().to_vec(), value.value().to_vec()))
                }
                None => None,
            }
        };

        let Some((key, bytes)) = oldest else {
            return Ok(false);
        };
        let id = id_from_document_key(&key)
            .ok_or_else(|| StorageError::deserialization("malformed document key"))?;
        let value = decode_value(&bytes)?;

        self.documents.remove(key.as_slice())?;
        self.remove_index_entries(meta, id, &value)?;

        stats.count = stats.count.saturating_sub(1);
        stats.bytes = stats.bytes.saturating_sub(bytes.len() as u64);
        stats.evicted += 1;
        trace!(collection = %meta.name, id, size = bytes.len(), "Evicted oldest document");
        Ok(true)
    }

    /// Append a document, trimming the collection first if it is capped
    fn insert(
        &mut self,
        meta: &CollectionMeta,
        stats: &mut CollectionStats,
        document: &EncodedDocument,
    ) -> Result<u64, StorageError> {
        let policy = CapacityPolicy::from_options(&meta.options);
        let len = document.len();
        policy.admit(len)?;

        while policy.must_evict(stats.count, stats.bytes, len) {
            if !self.evict_oldest(meta, stats)? {
                break;
            }
        }

        let id = stats.next_id;
        stats.next_id += 1;

        let key = document_key(&meta.name, id);
        self.documents.insert(key.as_slice(), document.bytes.as_slice())?;
        self.add_index_entries(meta, id, &document.value)?;

        stats.count += 1;
        stats.bytes += len;
        Ok(id)
    }
}

/// Collect up to `limit` document ids stored under an index key prefix
fn scan_index(
    index_entries: &impl ReadableTable<&'static [u8], u64>,
    prefix: &[u8],
    limit: Option<usize>,
) -> Result<Vec<u64>, StorageError> {
    let mut ids = Vec::new();
    if limit == Some(0) {
        return Ok(ids);
    }

    for entry in index_entries.range(prefix..)? {
        let (key, id) = entry?;
        if !key.value().starts_with(prefix) {
            break;
        }
        ids.push(id.value());
        if limit.is_some_and(|l| ids.len() >= l) {
            break;
        }
    }
    Ok(ids)
}

/// Visit documents in insertion order until `visit` returns false
fn scan_documents(
    documents: &impl ReadableTable<&'static [u8], &'static [u8]>,
    collection: &str,
    direction: Direction,
    mut visit: impl FnMut(u64, &[u8]) -> Result<bool, StorageError>,
) -> Result<(), StorageError> {
    let (start, end) = document_bounds(collection);
    let mut range = documents.range(start.as_slice()..=end.as_slice())?;

    loop {
        let entry = match direction {
            Direction::Forward => range.next(),
            Direction::Reverse => range.next_back(),
        };
        let Some(entry) = entry else {
            break;
        };
        let (key, value) = entry?;
        let id = id_from_document_key(key.value())
            .ok_or_else(|| StorageError::deserialization("malformed document key"))?;
        if !visit(id, value.value())? {
            break;
        }
    }
    Ok(())
}

/// Resolve a query to matching `(id, bytes)` pairs
fn run_query(
    meta: &CollectionMeta,
    documents: &impl ReadableTable<&'static [u8], &'static [u8]>,
    index_entries: &impl ReadableTable<&'static [u8], u64>,
    query: &Query,
) -> Result<Vec<(u64, Vec<u8>)>, StorageError> {
    let limit = query.max_results();
    let mut results = Vec::new();
    if limit == Some(0) {
        return Ok(results);
    }

    match query.plan(&meta.indexes) {
        Some(spec) => {
            let mut prefix = index_prefix(&meta.name, &spec.name());
            prefix.extend_from_slice(&query.encoded_prefix(spec));
            for id in scan_index(index_entries, &prefix, limit)? {
                let key = document_key(&meta.name, id);
                if let Some(bytes) = documents.get(key.as_slice())? {
                    results.push((id, bytes.value().to_vec()));
                }
            }
        }
        None => {
            scan_documents(documents, &meta.name, Direction::Reverse, |id, bytes| {
                if query.matches(id, &decode_value(bytes)?) {
                    results.push((id, bytes.to_vec()));
                }
                Ok(limit.is_none_or(|l| results.len() < l))
            })?;
        }
    }
    Ok(results)
}

enum IndexOutcome {
    Exists,
    Created { backfilled: u64 },
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(store: DocumentStore, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            _marker: PhantomData,
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Catalog entry (options and indexes)
    pub fn metadata(&self) -> Result<CollectionMeta, StorageError> {
        self.store.metadata(&self.name)
    }

    /// Creation options
    pub fn options(&self) -> Result<CollectionOptions, StorageError> {
        Ok(self.metadata()?.options)
    }

    /// Create an index, backfilling it from existing documents
    ///
    /// Safe to repeat: an index with the same name and key pattern is left
    /// untouched. Returns the index name.
    #[instrument(skip(self, spec), fields(collection = %self.name, index = %spec.name()))]
    pub fn create_index(&self, spec: IndexSpec) -> Result<String, StorageError> {
        spec.validate()?;
        let index_name = spec.name();

        let write_txn = self.store.db().begin_write()?;
        let outcome = {
            let mut catalog = write_txn.open_table(CATALOG)?;
            let mut meta = read_meta(&catalog, &self.name)?
                .ok_or_else(|| StorageError::CollectionNotFound(self.name.clone()))?;

            if let Some(existing) = meta.index(&index_name) {
                if !existing.same_key_pattern(&spec) {
                    return Err(StorageError::IndexConflict {
                        collection: self.name.clone(),
                        message: format!(
                            "index {} already exists with a different key pattern",
                            index_name
                        ),
                    });
                }
                IndexOutcome::Exists
            } else if let Some(existing) = meta.indexes.iter().find(|s| s.same_key_pattern(&spec)) {
                return Err(StorageError::IndexConflict {
                    collection: self.name.clone(),
                    message: format!(
                        "key pattern of {} is already indexed as {}",
                        index_name,
                        existing.name()
                    ),
                });
            } else {
                let documents = write_txn.open_table(DOCUMENTS)?;
                let mut index_entries = write_txn.open_table(INDEX_ENTRIES)?;
                let (start, end) = document_bounds(&self.name);
                let mut backfilled = 0u64;

                for entry in documents.range(start.as_slice()..=end.as_slice())? {
                    let (key, value) = entry?;
                    let id = id_from_document_key(key.value())
                        .ok_or_else(|| StorageError::deserialization("malformed document key"))?;
                    let value = decode_value(value.value())?;
                    let entry_key =
                        index_entry_key(&self.name, &index_name, &spec.encode_document(id, &value), id);
                    index_entries.insert(entry_key.as_slice(), id)?;
                    backfilled += 1;
                }

                meta.indexes.push(spec);
                write_meta(&mut catalog, &meta)?;
                IndexOutcome::Created { backfilled }
            }
        };

        match outcome {
            IndexOutcome::Exists => {
                write_txn.abort()?;
                debug!("Index already exists");
            }
            IndexOutcome::Created { backfilled } => {
                write_txn.commit()?;
                info!(backfilled, "Created index");
            }
        }
        Ok(index_name)
    }

    /// Index specifications in creation order
    pub fn list_indexes(&self) -> Result<Vec<IndexSpec>, StorageError> {
        Ok(self.metadata()?.indexes)
    }

    /// Insert one document, evicting the oldest ones if the collection is capped and full
    #[instrument(level = "debug", skip(self, document), fields(collection = %self.name))]
    pub fn insert_one(&self, document: &T) -> Result<DocumentId, StorageError> {
        let encoded = encode(document)?;
        let mut ids = self.insert_encoded(std::slice::from_ref(&encoded))?;
        Ok(ids.remove(0))
    }

    /// Insert documents in order within one transaction
    ///
    /// Either every document is stored or none is. Later documents may evict
    /// earlier ones from the same batch when the collection is small.
    #[instrument(level = "debug", skip(self, documents), fields(collection = %self.name, count = documents.len()))]
    pub fn insert_many(&self, documents: &[T]) -> Result<Vec<DocumentId>, StorageError> {
        let encoded = documents
            .iter()
            .map(encode)
            .collect::<Result<Vec<_>, _>>()?;
        self.insert_encoded(&encoded)
    }

    fn insert_encoded(&self, documents: &[EncodedDocument]) -> Result<Vec<DocumentId>, StorageError> {
        let write_txn = self.store.db().begin_write()?;
        let ids = {
            let meta = self.meta_in(&write_txn)?;
            let mut tables = WriteTables::open(&write_txn)?;
            let mut stats = tables.load_stats(&self.name)?;
            let evicted_before = stats.evicted;

            let mut ids = Vec::with_capacity(documents.len());
            for document in documents {
                ids.push(DocumentId(tables.insert(&meta, &mut stats, document)?));
            }
            write_stats(&mut tables.stats, &self.name, &stats)?;

            let evicted = stats.evicted - evicted_before;
            if evicted > 0 {
                debug!(evicted, count = stats.count, bytes = stats.bytes, "Trimmed capped collection");
            }
            ids
        };
        write_txn.commit()?;
        Ok(ids)
    }

    /// Fetch a document by id
    pub fn get(&self, id: DocumentId) -> Result<Option<Stored<T>>, StorageError> {
        let read_txn = self.store.db().begin_read()?;
        let documents = read_txn.open_table(DOCUMENTS)?;
        let key = document_key(&self.name, id.0);
        match documents.get(key.as_slice())? {
            Some(bytes) => Ok(Some(Stored {
                id,
                document: decode(bytes.value())?,
            })),
            None => Ok(None),
        }
    }

    /// Run an equality query
    pub fn find(&self, query: &Query) -> Result<Vec<Stored<T>>, StorageError> {
        let read_txn = self.store.db().begin_read()?;
        let meta = read_meta(&read_txn.open_table(CATALOG)?, &self.name)?
            .ok_or_else(|| StorageError::CollectionNotFound(self.name.clone()))?;
        let documents = read_txn.open_table(DOCUMENTS)?;
        let index_entries = read_txn.open_table(INDEX_ENTRIES)?;

        run_query(&meta, &documents, &index_entries, query)?
            .into_iter()
            .map(|(id, bytes)| {
                Ok(Stored {
                    id: DocumentId(id),
                    document: decode(&bytes)?,
                })
            })
            .collect()
    }

    /// First result of a query
    pub fn find_one(&self, query: &Query) -> Result<Option<Stored<T>>, StorageError> {
        Ok(self.find(&query.clone().limit(1))?.into_iter().next())
    }

    /// Read documents in insertion order
    pub fn natural(
        &self,
        direction: Direction,
        limit: Option<usize>,
    ) -> Result<Vec<Stored<T>>, StorageError> {
        let read_txn = self.store.db().begin_read()?;
        let documents = read_txn.open_table(DOCUMENTS)?;
        let mut results = Vec::new();
        if limit == Some(0) {
            return Ok(results);
        }

        scan_documents(&documents, &self.name, direction, |id, bytes| {
            results.push(Stored {
                id: DocumentId(id),
                document: decode(bytes)?,
            });
            Ok(limit.is_none_or(|l| results.len() < l))
        })?;
        Ok(results)
    }

    /// Replace a document in an uncapped collection
    #[instrument(level = "debug", skip(self, document), fields(collection = %self.name, id = %id))]
    pub fn replace_one(&self, id: DocumentId, document: &T) -> Result<(), StorageError> {
        let encoded = encode(document)?;
        let write_txn = self.store.db().begin_write()?;
        {
            let meta = self.mutable_meta_in(&write_txn)?;
            let mut tables = WriteTables::open(&write_txn)?;
            let mut stats = tables.load_stats(&self.name)?;
            self.replace_in(&meta, &mut tables, &mut stats, id.0, &encoded)?;
            write_stats(&mut tables.stats, &self.name, &stats)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete a document from an uncapped collection; false if it did not exist
    #[instrument(level = "debug", skip(self), fields(collection = %self.name, id = %id))]
    pub fn delete_one(&self, id: DocumentId) -> Result<bool, StorageError> {
        let write_txn = self.store.db().begin_write()?;
        let removed = {
            let meta = self.mutable_meta_in(&write_txn)?;
            let mut tables = WriteTables::open(&write_txn)?;
            match tables.stored_bytes(&self.name, id.0)? {
                Some(old) => {
                    let mut stats = tables.load_stats(&self.name)?;
                    tables.documents.remove(document_key(&self.name, id.0).as_slice())?;
                    tables.remove_index_entries(&meta, id.0, &decode_value(&old)?)?;
                    stats.count = stats.count.saturating_sub(1);
                    stats.bytes = stats.bytes.saturating_sub(old.len() as u64);
                    write_stats(&mut tables.stats, &self.name, &stats)?;
                    true
                }
                None => false,
            }
        };

        if removed {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(removed)
    }

    /// Replace the first match of `query`, or insert when nothing matches
    ///
    /// Lookup and write happen in one transaction. Returns the document id
    /// and whether it was inserted.
    #[instrument(level = "debug", skip(self, query, document), fields(collection = %self.name))]
    pub fn upsert_one(&self, query: &Query, document: &T) -> Result<(DocumentId, bool), StorageError> {
        let encoded = encode(document)?;
        let write_txn = self.store.db().begin_write()?;
        let outcome = {
            let meta = self.mutable_meta_in(&write_txn)?;
            let mut tables = WriteTables::open(&write_txn)?;
            let mut stats = tables.load_stats(&self.name)?;

            let existing = run_query(
                &meta,
                &tables.documents,
                &tables.index_entries,
                &query.clone().limit(1),
            )?
            .into_iter()
            .next();

            let outcome = match existing {
                Some((id, _)) => {
                    self.replace_in(&meta, &mut tables, &mut stats, id, &encoded)?;
                    (DocumentId(id), false)
                }
                None => (DocumentId(tables.insert(&meta, &mut stats, &encoded)?), true),
            };
            write_stats(&mut tables.stats, &self.name, &stats)?;
            outcome
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Running totals
    pub fn stats(&self) -> Result<CollectionStats, StorageError> {
        let read_txn = self.store.db().begin_read()?;
        let stats = read_txn.open_table(COLLECTION_STATS)?;
        read_stats(&stats, &self.name)?
            .ok_or_else(|| StorageError::CollectionNotFound(self.name.clone()))
    }

    /// Number of stored documents
    pub fn count(&self) -> Result<u64, StorageError> {
        Ok(self.stats()?.count)
    }

    fn meta_in(&self, txn: &WriteTransaction) -> Result<CollectionMeta, StorageError> {
        let catalog = txn.open_table(CATALOG)?;
        read_meta(&catalog, &self.name)?
            .ok_or_else(|| StorageError::CollectionNotFound(self.name.clone()))
    }

    fn mutable_meta_in(&self, txn: &WriteTransaction) -> Result<CollectionMeta, StorageError> {
        let meta = self.meta_in(txn)?;
        if meta.options.capped {
            return Err(StorageError::CappedCollectionImmutable(self.name.clone()));
        }
        Ok(meta)
    }

    fn replace_in(
        &self,
        meta: &CollectionMeta,
        tables: &mut WriteTables<'_>,
        stats: &mut CollectionStats,
        id: u64,
        document: &EncodedDocument,
    ) -> Result<(), StorageError> {
        CapacityPolicy::from_options(&meta.options).admit(document.len())?;
        let old = tables
            .stored_bytes(&self.name, id)?
            .ok_or_else(|| StorageError::DocumentNotFound {
                collection: self.name.clone(),
                id,
            })?;
        tables.remove_index_entries(meta, id, &decode_value(&old)?)?;

        let key = document_key(&self.name, id);
        tables.documents.insert(key.as_slice(), document.bytes.as_slice())?;
        tables.add_index_entries(meta, id, &document.value)?;

        stats.bytes = stats.bytes.saturating_sub(old.len() as u64) + document.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::tables::RedbStorageConfig;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        room: String,
        text: String,
    }

    fn note(room: &str, text: &str) -> Note {
        Note {
            room: room.into(),
            text: text.into(),
        }
    }

    fn texts(stored: &[Stored<Note>]) -> Vec<&str> {
        stored.iter().map(|s| s.document.text.as_str()).collect()
    }

    fn capped_notes(size: u64, max: Option<u64>) -> Collection<Note> {
        let store = DocumentStore::in_memory().unwrap();
        let mut options = CollectionOptions::capped(size);
        options.max = max;
        store.create_collection("notes", options).unwrap();
        let notes = store.collection::<Note>("notes").unwrap();
        notes
            .create_index(IndexSpec::new().asc("room").desc(ID_FIELD))
            .unwrap();
        notes
    }

    fn encoded_len(n: &Note) -> u64 {
        serde_json::to_vec(n).unwrap().len() as u64
    }

    #[test]
    fn test_insert_and_get() {
        let notes = capped_notes(1024 * 1024, None);
        let id = notes.insert_one(&note("A", "hi")).unwrap();
        assert_eq!(id, DocumentId(1));

        let stored = notes.get(id).unwrap().unwrap();
        assert_eq!(stored.document, note("A", "hi"));
        assert!(notes.get(DocumentId(99)).unwrap().is_none());
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let notes = capped_notes(1024 * 1024, None);
        let ids = notes
            .insert_many(&[note("A", "1"), note("B", "2"), note("A", "3")])
            .unwrap();
        assert_eq!(ids, vec![DocumentId(1), DocumentId(2), DocumentId(3)]);
        assert_eq!(notes.stats().unwrap().next_id, 4);
    }

    #[test]
    fn test_find_by_partition_newest_first() {
        let notes = capped_notes(1024 * 1024, None);
        notes.insert_one(&note("A", "hi")).unwrap();
        notes.insert_one(&note("A", "bye")).unwrap();
        notes.insert_one(&note("B", "x")).unwrap();

        let a = notes.find(&Query::new().eq("room", "A")).unwrap();
        assert_eq!(texts(&a), vec!["bye", "hi"]);

        let b = notes.find(&Query::new().eq("room", "B")).unwrap();
        assert_eq!(texts(&b), vec!["x"]);

        let limited = notes.find(&Query::new().eq("room", "A").limit(1)).unwrap();
        assert_eq!(texts(&limited), vec!["bye"]);

        assert!(notes.find(&Query::new().eq("room", "C")).unwrap().is_empty());
    }

    #[test]
    fn test_find_without_index_scans_newest_first() {
        let notes = capped_notes(1024 * 1024, None);
        notes.insert_one(&note("A", "same")).unwrap();
        notes.insert_one(&note("B", "other")).unwrap();
        notes.insert_one(&note("C", "same")).unwrap();

        let found = notes.find(&Query::new().eq("text", "same")).unwrap();
        assert_eq!(
            found.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![DocumentId(3), DocumentId(1)]
        );

        let all = notes.find(&Query::new().limit(2)).unwrap();
        assert_eq!(texts(&all), vec!["same", "other"]);
    }

    #[test]
    fn test_count_cap_evicts_oldest() {
        let notes = capped_notes(1024 * 1024, Some(3));
        for i in 0..5 {
            notes.insert_one(&note("A", &i.to_string())).unwrap();
        }

        let stats = notes.stats().unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.evicted, 2);

        let remaining = notes.natural(Direction::Forward, None).unwrap();
        assert_eq!(texts(&remaining), vec!["2", "3", "4"]);

        // Evicted documents are gone from the index too
        let indexed = notes.find(&Query::new().eq("room", "A")).unwrap();
        assert_eq!(texts(&indexed), vec!["4", "3", "2"]);
    }

    #[test]
    fn test_byte_cap_evicts_oldest() {
        let sample = note("A", "0123456789");
        let len = encoded_len(&sample);
        // Room for exactly three documents
        let notes = capped_notes(len * 3 + len / 2, None);

        for _ in 0..4 {
            notes.insert_one(&sample).unwrap();
        }

        let stats = notes.stats().unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.bytes, len * 3);
        assert!(notes.get(DocumentId(1)).unwrap().is_none());
        assert!(notes.get(DocumentId(2)).unwrap().is_some());
    }

    #[test]
    fn test_large_document_evicts_several() {
        let small = note("A", "x");
        let small_len = encoded_len(&small);
        let big = note("A", &"y".repeat(200));
        let big_len = encoded_len(&big);
        let notes = capped_notes(big_len + small_len, None);

        for _ in 0..5 {
            notes.insert_one(&small).unwrap();
        }
        notes.insert_one(&big).unwrap();

        let stats = notes.stats().unwrap();
        assert!(stats.bytes <= big_len + small_len);
        assert_eq!(notes.natural(Direction::Reverse, Some(1)).unwrap()[0].document, big);
    }

    #[test]
    fn test_document_larger_than_cap_rejected() {
        let notes = capped_notes(16, None);
        let err = notes.insert_one(&note("A", "far too long for sixteen bytes")).unwrap_err();
        assert!(matches!(err, StorageError::DocumentTooLarge { limit: 16, .. }));
        assert_eq!(notes.count().unwrap(), 0);
    }

    #[test]
    fn test_dotted_keys_rejected() {
        let store = DocumentStore::in_memory().unwrap();
        store
            .create_collection("raw", CollectionOptions::uncapped())
            .unwrap();
        let raw = store.collection::<Value>("raw").unwrap();
        let err = raw.insert_one(&json!({ "body": { "a.b": 1 } })).unwrap_err();
        assert!(matches!(err, StorageError::InvalidDocument(_)));
        assert!(raw.insert_one(&json!({ "body": "{\"a.b\":1}" })).is_ok());
    }

    #[test]
    fn test_insert_many_is_atomic() {
        let store = DocumentStore::in_memory().unwrap();
        store
            .create_collection("raw", CollectionOptions::uncapped())
            .unwrap();
        let raw = store.collection::<Value>("raw").unwrap();
        let result = raw.insert_many(&[json!({ "ok": 1 }), json!({ "bad.key": 2 })]);
        assert!(result.is_err());
        assert_eq!(raw.count().unwrap(), 0);
    }

    #[test]
    fn test_capped_rejects_replace_and_delete() {
        let notes = capped_notes(1024, None);
        let id = notes.insert_one(&note("A", "hi")).unwrap();

        assert!(matches!(
            notes.replace_one(id, &note("A", "edited")),
            Err(StorageError::CappedCollectionImmutable(_))
        ));
        assert!(matches!(
            notes.delete_one(id),
            Err(StorageError::CappedCollectionImmutable(_))
        ));
        assert!(notes
            .upsert_one(&Query::new().eq("room", "A"), &note("A", "x"))
            .is_err());
        assert_eq!(notes.get(id).unwrap().unwrap().document.text, "hi");
    }

    #[test]
    fn test_uncapped_replace_updates_index() {
        let store = DocumentStore::in_memory().unwrap();
        store
            .create_collection("notes", CollectionOptions::uncapped())
            .unwrap();
        let notes = store.collection::<Note>("notes").unwrap();
        notes.create_index(IndexSpec::new().asc("room")).unwrap();

        let id = notes.insert_one(&note("A", "hi")).unwrap();
        notes.replace_one(id, &note("B", "moved")).unwrap();

        assert!(notes.find(&Query::new().eq("room", "A")).unwrap().is_empty());
        assert_eq!(
            texts(&notes.find(&Query::new().eq("room", "B")).unwrap()),
            vec!["moved"]
        );
        assert_eq!(notes.stats().unwrap().bytes, encoded_len(&note("B", "moved")));

        assert!(matches!(
            notes.replace_one(DocumentId(42), &note("C", "none")),
            Err(StorageError::DocumentNotFound { id: 42, .. })
        ));
    }

    #[test]
    fn test_uncapped_delete() {
        let store = DocumentStore::in_memory().unwrap();
        store
            .create_collection("notes", CollectionOptions::uncapped())
            .unwrap();
        let notes = store.collection::<Note>("notes").unwrap();
        notes.create_index(IndexSpec::new().asc("room")).unwrap();

        let id = notes.insert_one(&note("A", "hi")).unwrap();
        assert!(notes.delete_one(id).unwrap());
        assert!(!notes.delete_one(id).unwrap());
        assert_eq!(notes.count().unwrap(), 0);
        assert_eq!(notes.stats().unwrap().bytes, 0);
        assert!(notes.find(&Query::new().eq("room", "A")).unwrap().is_empty());
    }

    #[test]
    fn test_upsert() {
        let store = DocumentStore::in_memory().unwrap();
        store
            .create_collection("notes", CollectionOptions::uncapped())
            .unwrap();
        let notes = store.collection::<Note>("notes").unwrap();
        notes.create_index(IndexSpec::new().asc("room")).unwrap();

        let (first, inserted) = notes
            .upsert_one(&Query::new().eq("room", "A"), &note("A", "v1"))
            .unwrap();
        assert!(inserted);

        let (second, inserted) = notes
            .upsert_one(&Query::new().eq("room", "A"), &note("A", "v2"))
            .unwrap();
        assert!(!inserted);
        assert_eq!(first, second);
        assert_eq!(notes.count().unwrap(), 1);
        assert_eq!(notes.get(first).unwrap().unwrap().document.text, "v2");
    }

    #[test]
    fn test_create_index_is_idempotent() {
        let notes = capped_notes(1024, None);
        let name = notes
            .create_index(IndexSpec::new().asc("room").desc(ID_FIELD))
            .unwrap();
        assert_eq!(name, "room_1__id_-1");
        assert_eq!(notes.list_indexes().unwrap().len(), 1);
    }

    #[test]
    fn test_create_index_conflicts() {
        let notes = capped_notes(1024, None);

        let renamed = IndexSpec::new().asc("room").desc(ID_FIELD).named("by_room");
        assert!(matches!(
            notes.create_index(renamed),
            Err(StorageError::IndexConflict { .. })
        ));

        let clash = IndexSpec::new().asc("text").named("room_1__id_-1");
        assert!(matches!(
            notes.create_index(clash),
            Err(StorageError::IndexConflict { .. })
        ));
        assert_eq!(notes.list_indexes().unwrap().len(), 1);
    }

    #[test]
    fn test_create_index_backfills() {
        let notes = capped_notes(1024 * 1024, None);
        notes.insert_one(&note("A", "one")).unwrap();
        notes.insert_one(&note("B", "two")).unwrap();

        notes
            .create_index(IndexSpec::new().asc("text").desc(ID_FIELD))
            .unwrap();
        let found = notes.find(&Query::new().eq("text", "two")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, DocumentId(2));
    }

    #[test]
    fn test_natural_order() {
        let notes = capped_notes(1024 * 1024, None);
        for t in ["a", "b", "c"] {
            notes.insert_one(&note("A", t)).unwrap();
        }
        assert_eq!(texts(&notes.natural(Direction::Forward, None).unwrap()), vec!["a", "b", "c"]);
        assert_eq!(texts(&notes.natural(Direction::Reverse, Some(2)).unwrap()), vec!["c", "b"]);
        assert!(notes.natural(Direction::Forward, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn test_collections_do_not_leak_into_each_other() {
        let store = DocumentStore::in_memory().unwrap();
        store.create_collection("a", CollectionOptions::capped(4096)).unwrap();
        store.create_collection("ab", CollectionOptions::capped(4096)).unwrap();
        let a = store.collection::<Note>("a").unwrap();
        let ab = store.collection::<Note>("ab").unwrap();

        a.insert_one(&note("A", "in a")).unwrap();
        ab.insert_one(&note("A", "in ab")).unwrap();

        assert_eq!(texts(&a.natural(Direction::Forward, None).unwrap()), vec!["in a"]);
        assert_eq!(texts(&ab.natural(Direction::Forward, None).unwrap()), vec!["in ab"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbStorageConfig {
            db_path: temp_dir.path().join("test.redb"),
            ..Default::default()
        };

        {
            let store = DocumentStore::open(config.clone()).unwrap();
            store.create_collection("notes", CollectionOptions::capped(4096).with_max(2)).unwrap();
            let notes = store.collection::<Note>("notes").unwrap();
            notes.create_index(IndexSpec::new().asc("room").desc(ID_FIELD)).unwrap();
            notes.insert_one(&note("A", "1")).unwrap();
            notes.insert_one(&note("A", "2")).unwrap();
        }

        let store = DocumentStore::open(config).unwrap();
        let notes = store.collection::<Note>("notes").unwrap();
        assert_eq!(notes.count().unwrap(), 2);

        // Cap and id sequence survive the restart
        let id = notes.insert_one(&note("A", "3")).unwrap();
        assert_eq!(id, DocumentId(3));
        assert_eq!(texts(&notes.find(&Query::new().eq("room", "A")).unwrap()), vec!["3", "2"]);
    }
}
