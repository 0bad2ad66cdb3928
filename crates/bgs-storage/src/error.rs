//! Error types for bgs-storage
//!
//! This module defines the error types used throughout the storage crate.

use thiserror::Error;

use crate::collection::CollectionOptions;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Error reported by the underlying database engine
    #[error("Database error: {0}")]
    Database(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Collection has not been provisioned
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Collection exists with different capacity parameters
    #[error("Collection {name} already exists with options {existing:?}, requested {requested:?}")]
    CollectionOptionsMismatch {
        name: String,
        existing: CollectionOptions,
        requested: CollectionOptions,
    },

    /// Malformed collection options or name
    #[error("Invalid collection options: {0}")]
    InvalidOptions(String),

    /// Document cannot be stored as given
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Serialized document exceeds the per-document or collection limit
    #[error("Document of {size} bytes exceeds the limit of {limit} bytes")]
    DocumentTooLarge { size: u64, limit: u64 },

    /// Index name or key pattern clashes with an existing index
    #[error("Index conflict on {collection}: {message}")]
    IndexConflict { collection: String, message: String },

    /// Malformed index specification
    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    /// Capped collections only accept inserts
    #[error("Collection {0} is capped; documents cannot be replaced or deleted")]
    CappedCollectionImmutable(String),

    /// Document not found
    #[error("Document {id} not found in {collection}")]
    DocumentNotFound { collection: String, id: u64 },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new InvalidDocument error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }

    /// Create a new InvalidOptions error
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}

/// Convert from postcard Error to StorageError
///
/// Decoding is the common case; encode sites map through
/// [`StorageError::serialization`] instead.
impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

macro_rules! from_redb_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(err: $ty) -> Self {
                    StorageError::Database(err.to_string())
                }
            }
        )*
    };
}

from_redb_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
