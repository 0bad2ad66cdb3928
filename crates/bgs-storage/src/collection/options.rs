//! Collection options, catalog metadata and statistics

use serde::{Deserialize, Serialize};

use super::index::IndexSpec;
use crate::error::StorageError;

/// Longest collection name accepted, in bytes
pub const MAX_COLLECTION_NAME_LEN: usize = 120;

/// Creation options of a collection
///
/// A capped collection requires `size` (bytes) and may additionally bound the
/// document count with `max`; whichever bound is reached first triggers
/// eviction of the oldest documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionOptions {
    pub capped: bool,
    pub size: Option<u64>,
    pub max: Option<u64>,
}

impl CollectionOptions {
    /// Plain, unbounded collection
    pub fn uncapped() -> Self {
        Self::default()
    }

    /// Capped collection bounded by `size` bytes
    pub fn capped(size: u64) -> Self {
        Self {
            capped: true,
            size: Some(size),
            max: None,
        }
    }

    /// Additionally bound the document count
    pub fn with_max(mut self, max: u64) -> Self {
        self.max = Some(max);
        self
    }

    /// Check the options are well formed
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.capped {
            match self.size {
                None => {
                    return Err(StorageError::invalid_options(
                        "capped collections require a size",
                    ));
                }
                Some(0) => {
                    return Err(StorageError::invalid_options(
                        "capped collection size must be positive",
                    ));
                }
                Some(_) => {}
            }
            if self.max == Some(0) {
                return Err(StorageError::invalid_options(
                    "capped collection max must be positive",
                ));
            }
        } else if self.size.is_some() || self.max.is_some() {
            return Err(StorageError::invalid_options(
                "size and max only apply to capped collections",
            ));
        }
        Ok(())
    }
}

/// Validate a collection name
pub fn validate_collection_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::invalid_options("collection name is empty"));
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(StorageError::invalid_options(format!(
            "collection name is {} bytes, at most {} allowed",
            name.len(),
            MAX_COLLECTION_NAME_LEN
        )));
    }
    if name.contains('$') || name.chars().any(char::is_control) {
        return Err(StorageError::invalid_options(format!(
            "collection name {:?} contains a forbidden character",
            name
        )));
    }
    Ok(())
}

/// Catalog entry for a provisioned collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    pub options: CollectionOptions,
    /// Indexes in creation order
    pub indexes: Vec<IndexSpec>,
    pub created_at_millis: i64,
}

impl CollectionMeta {
    /// Create a catalog entry with no indexes
    pub fn new(name: impl Into<String>, options: CollectionOptions) -> Self {
        Self {
            name: name.into(),
            options,
            indexes: Vec::new(),
            created_at_millis: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Find an index by name
    pub fn index(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|spec| spec.name() == name)
    }
}

/// Running totals for a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Documents currently stored
    pub count: u64,
    /// Total serialized size of stored documents
    pub bytes: u64,
    /// Id the next insert will receive
    pub next_id: u64,
    /// Documents removed by capacity eviction since creation
    pub evicted: u64,
}

impl CollectionStats {
    pub(crate) fn fresh() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }
}
