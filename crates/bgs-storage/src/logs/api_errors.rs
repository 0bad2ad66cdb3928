//! API error log

use bgs_core::{ApiError, UserId};
use tracing::instrument;

use crate::collection::{Collection, DocumentId, Query, Stored};
use crate::config::Capacities;
use crate::error::StorageError;
use crate::provision::{API_ERRORS, create_api_error_collection_with};
use crate::tables::DocumentStore;

/// Append-only error reports, trimmed oldest-first at capacity
#[derive(Debug, Clone)]
pub struct ApiErrorLog {
    errors: Collection<ApiError>,
}

impl ApiErrorLog {
    pub fn new(errors: Collection<ApiError>) -> Self {
        Self { errors }
    }

    /// Provision the collection if needed and wrap it
    pub fn provision(store: &DocumentStore, capacities: &Capacities) -> Result<Self, StorageError> {
        Ok(Self::new(create_api_error_collection_with(store, capacities)?))
    }

    /// Open the existing error collection
    pub fn open(store: &DocumentStore) -> Result<Self, StorageError> {
        Ok(Self::new(store.collection(API_ERRORS)?))
    }

    /// Append an error report
    #[instrument(level = "debug", skip(self, error), fields(name = %error.error.name))]
    pub fn record(&self, error: &ApiError) -> Result<DocumentId, StorageError> {
        self.errors.insert_one(error)
    }

    /// Most recent reports for a user by creation time
    pub fn recent_for_user(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<Stored<ApiError>>, StorageError> {
        self.errors
            .find(&Query::new().eq("user", user.as_str()).limit(limit))
    }

    /// Most recently inserted reports regardless of user
    pub fn recent(&self, limit: usize) -> Result<Vec<Stored<ApiError>>, StorageError> {
        self.errors.find(&Query::new().limit(limit))
    }

    pub fn collection(&self) -> &Collection<ApiError> {
        &self.errors
    }
}
