//! redb table definitions and the document store handle
//!
//! Defines all tables used for document storage. Collection names scope every
//! key, so one set of tables holds all collections.

use std::path::PathBuf;
use std::sync::Arc;

use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, Table, TableDefinition};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, instrument, warn};

use crate::collection::keys::{collection_prefix, document_bounds};
use crate::collection::{
    Collection, CollectionMeta, CollectionOptions, CollectionStats, validate_collection_name,
};
use crate::error::StorageError;

// Key: collection name, Value: postcard CollectionMeta
pub const CATALOG: TableDefinition<&str, &[u8]> = TableDefinition::new("catalog");

// Key: collection name, Value: postcard CollectionStats
pub const COLLECTION_STATS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("collection_stats");

// Key: (collection, id) concatenated, Value: JSON document
pub const DOCUMENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("documents");

// Key: (collection, index, encoded fields, id) concatenated, Value: document id
pub const INDEX_ENTRIES: TableDefinition<&[u8], u64> = TableDefinition::new("index_entries");

/// Configuration for redb storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/bgs.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Handle onto a document database
///
/// Cheap to clone; clones share the underlying database. All writes are
/// serialized by redb's single writer, and the database file is locked
/// against other processes while open.
#[derive(Clone)]
pub struct DocumentStore {
    db: Arc<Database>,
    config: Option<RedbStorageConfig>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("config", &self.config)
            .finish()
    }
}

impl DocumentStore {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)?;

        info!("Opened redb database");

        let store = Self {
            db: Arc::new(db),
            config: Some(config),
        };
        store.init_tables()?;
        Ok(store)
    }

    /// Create a store that lives only in memory
    pub fn in_memory() -> Result<Self, StorageError> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        let store = Self {
            db: Arc::new(db),
            config: None,
        };
        store.init_tables()?;
        debug!("Opened in-memory database");
        Ok(store)
    }

    /// Initialize all tables
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write()?;

        // Create tables if they don't exist
        write_txn.open_table(CATALOG)?;
        write_txn.open_table(COLLECTION_STATS)?;
        write_txn.open_table(DOCUMENTS)?;
        write_txn.open_table(INDEX_ENTRIES)?;

        write_txn.commit()?;

        debug!("Initialized redb tables");
        Ok(())
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    /// Get the configuration; `None` for in-memory stores
    pub fn config(&self) -> Option<&RedbStorageConfig> {
        self.config.as_ref()
    }

    /// Create a collection, or confirm an existing one has the same options
    ///
    /// Concurrent callers racing to create the same collection all succeed
    /// and observe a single catalog entry.
    #[instrument(skip(self), fields(collection = %name))]
    pub fn create_collection(
        &self,
        name: &str,
        options: CollectionOptions,
    ) -> Result<CollectionMeta, StorageError> {
        validate_collection_name(name)?;
        options.validate()?;

        let write_txn = self.db.begin_write()?;
        let (meta, created) = {
            let mut catalog = write_txn.open_table(CATALOG)?;
            match read_meta(&catalog, name)? {
                Some(existing) if existing.options == options => (existing, false),
                Some(existing) => {
                    warn!(existing = ?existing.options, requested = ?options, "Collection exists with different options");
                    return Err(StorageError::CollectionOptionsMismatch {
                        name: name.to_string(),
                        existing: existing.options,
                        requested: options,
                    });
                }
                None => {
                    let meta = CollectionMeta::new(name, options);
                    write_meta(&mut catalog, &meta)?;
                    let mut stats = write_txn.open_table(COLLECTION_STATS)?;
                    write_stats(&mut stats, name, &CollectionStats::fresh())?;
                    (meta, true)
                }
            }
        };

        if created {
            write_txn.commit()?;
            info!(
                capped = options.capped,
                size = ?options.size,
                max = ?options.max,
                "Created collection"
            );
        } else {
            write_txn.abort()?;
            debug!("Collection already exists");
        }
        Ok(meta)
    }

    /// Open a typed handle onto an existing collection
    pub fn collection<T>(&self, name: &str) -> Result<Collection<T>, StorageError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.metadata(name)?;
        Ok(Collection::new(self.clone(), name))
    }

    /// Catalog entry of a collection
    pub fn metadata(&self, name: &str) -> Result<CollectionMeta, StorageError> {
        let read_txn = self.db.begin_read()?;
        let catalog = read_txn.open_table(CATALOG)?;
        read_meta(&catalog, name)?.ok_or_else(|| StorageError::CollectionNotFound(name.to_string()))
    }

    /// All collections, ordered by name
    pub fn list_collections(&self) -> Result<Vec<CollectionMeta>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let catalog = read_txn.open_table(CATALOG)?;

        let mut collections = Vec::new();
        for entry in catalog.iter()? {
            let (_, value) = entry?;
            collections.push(postcard::from_bytes(value.value())?);
        }
        Ok(collections)
    }

    /// Remove a collection with its documents and indexes
    ///
    /// Returns false if the collection did not exist.
    #[instrument(skip(self), fields(collection = %name))]
    pub fn drop_collection(&self, name: &str) -> Result<bool, StorageError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut catalog = write_txn.open_table(CATALOG)?;
            if catalog.remove(name)?.is_none() {
                None
            } else {
                let mut stats = write_txn.open_table(COLLECTION_STATS)?;
                stats.remove(name)?;

                let mut documents = write_txn.open_table(DOCUMENTS)?;
                let (start, end) = document_bounds(name);
                let mut document_keys = Vec::new();
                for entry in documents.range(start.as_slice()..=end.as_slice())? {
                    let (key, _) = entry?;
                    document_keys.push(key.value().to_vec());
                }
                for key in &document_keys {
                    documents.remove(key.as_slice())?;
                }

                let mut index_entries = write_txn.open_table(INDEX_ENTRIES)?;
                let prefix = collection_prefix(name);
                let keys = prefix_keys(&index_entries, &prefix)?;
                for key in &keys {
                    index_entries.remove(key.as_slice())?;
                }
                Some((document_keys.len(), keys.len()))
            }
        };

        match removed {
            Some((documents, index_entries)) => {
                write_txn.commit()?;
                info!(documents, index_entries, "Dropped collection");
                Ok(true)
            }
            None => {
                write_txn.abort()?;
                Ok(false)
            }
        }
    }
}

fn prefix_keys(
    table: &impl ReadableTable<&'static [u8], u64>,
    prefix: &[u8],
) -> Result<Vec<Vec<u8>>, StorageError> {
    let mut keys = Vec::new();
    for entry in table.range(prefix..)? {
        let (key, _) = entry?;
        if !key.value().starts_with(prefix) {
            break;
        }
        keys.push(key.value().to_vec());
    }
    Ok(keys)
}

pub(crate) fn read_meta(
    catalog: &impl ReadableTable<&'static str, &'static [u8]>,
    name: &str,
) -> Result<Option<CollectionMeta>, StorageError> {
    match catalog.get(name)? {
        Some(value) => Ok(Some(postcard::from_bytes(value.value())?)),
        None => Ok(None),
    }
}

/// Encode a catalog or stats value
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(value).map_err(|err| StorageError::serialization(err.to_string()))
}

pub(crate) fn write_meta(
    catalog: &mut Table<'_, &'static str, &'static [u8]>,
    meta: &CollectionMeta,
) -> Result<(), StorageError> {
    let bytes = encode(meta)?;
    catalog.insert(meta.name.as_str(), bytes.as_slice())?;
    Ok(())
}

pub(crate) fn read_stats(
    stats: &impl ReadableTable<&'static str, &'static [u8]>,
    name: &str,
) -> Result<Option<CollectionStats>, StorageError> {
    match stats.get(name)? {
        Some(value) => Ok(Some(postcard::from_bytes(value.value())?)),
        None => Ok(None),
    }
}

pub(crate) fn write_stats(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    name: &str,
    stats: &CollectionStats,
) -> Result<(), StorageError> {
    let bytes = encode(stats)?;
    table.insert(name, bytes.as_slice())?;
    Ok(())
}
