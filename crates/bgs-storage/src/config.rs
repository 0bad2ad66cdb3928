//! Store configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! db_path = "/var/lib/bgs/bgs.redb"
//! cache_size = 67108864
//!
//! [capacities]
//! chat_size_bytes = 104857600
//! api_error_size_bytes = 10485760
//! api_error_max_docs = 10000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::tables::RedbStorageConfig;

/// Byte capacity of the chat message log (100 MiB)
pub const DEFAULT_CHAT_SIZE_BYTES: u64 = 100 * 1024 * 1024;
/// Byte capacity of the API error log (10 MiB)
pub const DEFAULT_API_ERROR_SIZE_BYTES: u64 = 10 * 1024 * 1024;
/// Document capacity of the API error log
pub const DEFAULT_API_ERROR_MAX_DOCS: u64 = 10_000;

/// Capacities of the capped log collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacities {
    #[serde(default = "default_chat_size_bytes")]
    pub chat_size_bytes: u64,

    #[serde(default = "default_api_error_size_bytes")]
    pub api_error_size_bytes: u64,

    #[serde(default = "default_api_error_max_docs")]
    pub api_error_max_docs: u64,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            chat_size_bytes: default_chat_size_bytes(),
            api_error_size_bytes: default_api_error_size_bytes(),
            api_error_max_docs: default_api_error_max_docs(),
        }
    }
}

fn default_chat_size_bytes() -> u64 {
    DEFAULT_CHAT_SIZE_BYTES
}

fn default_api_error_size_bytes() -> u64 {
    DEFAULT_API_ERROR_SIZE_BYTES
}

fn default_api_error_max_docs() -> u64 {
    DEFAULT_API_ERROR_MAX_DOCS
}

/// Top-level store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// redb cache size in bytes
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default)]
    pub capacities: Capacities,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_size: default_cache_size(),
            capacities: Capacities::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    RedbStorageConfig::default().db_path
}

fn default_cache_size() -> usize {
    RedbStorageConfig::default().cache_size
}

impl StoreConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, StorageError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Reject zero capacities
    pub fn validate(&self) -> Result<(), StorageError> {
        let caps = &self.capacities;
        if caps.chat_size_bytes == 0 || caps.api_error_size_bytes == 0 {
            return Err(StorageError::Config(
                "collection byte capacities must be positive".into(),
            ));
        }
        if caps.api_error_max_docs == 0 {
            return Err(StorageError::Config(
                "api_error_max_docs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Storage settings for [`DocumentStore::open`](crate::DocumentStore::open)
    pub fn storage(&self) -> RedbStorageConfig {
        RedbStorageConfig {
            db_path: self.db_path.clone(),
            cache_size: self.cache_size,
        }
    }
}
