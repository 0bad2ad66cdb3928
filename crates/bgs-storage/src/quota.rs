//! Capacity management for capped collections
//!
//! A capped collection is bounded by a byte budget and, optionally, a
//! document count. When an insert would cross either bound the oldest
//! documents (in insertion order) are evicted until the new one fits.

use crate::collection::CollectionOptions;
use crate::error::StorageError;

/// Largest document the store accepts, in serialized bytes
pub const MAX_DOCUMENT_SIZE: u64 = 16 * 1024 * 1024;

/// Byte and count bounds enforced on every insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapacityPolicy {
    /// Maximum total serialized size of all documents
    max_bytes: Option<u64>,
    /// Maximum number of documents
    max_documents: Option<u64>,
}

impl CapacityPolicy {
    /// No bounds at all (uncapped collection)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create a policy with explicit bounds
    pub fn new(max_bytes: Option<u64>, max_documents: Option<u64>) -> Self {
        Self {
            max_bytes,
            max_documents,
        }
    }

    /// Derive the policy from collection options
    pub fn from_options(options: &CollectionOptions) -> Self {
        if options.capped {
            Self::new(options.size, options.max)
        } else {
            Self::unbounded()
        }
    }

    /// Get the byte bound
    pub fn max_bytes(&self) -> Option<u64> {
        self.max_bytes
    }

    /// Get the document bound
    pub fn max_documents(&self) -> Option<u64> {
        self.max_documents
    }

    /// Whether any bound applies
    pub fn is_bounded(&self) -> bool {
        self.max_bytes.is_some() || self.max_documents.is_some()
    }

    /// Reject documents that could never fit, even in an empty collection
    pub fn admit(&self, document_len: u64) -> Result<(), StorageError> {
        if document_len > MAX_DOCUMENT_SIZE {
            return Err(StorageError::DocumentTooLarge {
                size: document_len,
                limit: MAX_DOCUMENT_SIZE,
            });
        }
        if let Some(limit) = self.max_bytes {
            if document_len > limit {
                return Err(StorageError::DocumentTooLarge {
                    size: document_len,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// Check if adding a document would exceed the count bound
    pub fn would_exceed_documents(&self, current_count: u64) -> bool {
        self.max_documents
            .is_some_and(|max| current_count.saturating_add(1) > max)
    }

    /// Check if adding `incoming` bytes would exceed the byte bound
    pub fn would_exceed_bytes(&self, current_bytes: u64, incoming: u64) -> bool {
        self.max_bytes
            .is_some_and(|max| current_bytes.saturating_add(incoming) > max)
    }

    /// Whether the oldest document must go before `incoming` bytes can be added
    pub fn must_evict(&self, current_count: u64, current_bytes: u64, incoming: u64) -> bool {
        self.would_exceed_documents(current_count) || self.would_exceed_bytes(current_bytes, incoming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_evicts() {
        let policy = CapacityPolicy::unbounded();
        assert!(!policy.is_bounded());
        assert!(!policy.must_evict(u64::MAX - 1, u64::MAX - 1, 1_000));
        assert!(policy.admit(1024).is_ok());
    }

    #[test]
    fn test_would_exceed_documents() {
        let policy = CapacityPolicy::new(None, Some(10));

        assert!(!policy.would_exceed_documents(5));
        assert!(!policy.would_exceed_documents(9));
        assert!(policy.would_exceed_documents(10));
        assert!(policy.would_exceed_documents(15));
    }

    #[test]
    fn test_would_exceed_bytes() {
        let policy = CapacityPolicy::new(Some(100), None);

        // Exactly at the bound is allowed
        assert!(!policy.would_exceed_bytes(95, 5));
        assert!(policy.would_exceed_bytes(95, 6));
        assert!(policy.would_exceed_bytes(100, 1));
    }

    #[test]
    fn test_dual_bound_whichever_first() {
        let policy = CapacityPolicy::new(Some(1_000), Some(3));

        // Count binds
        assert!(policy.must_evict(3, 30, 10));
        // Bytes bind
        assert!(policy.must_evict(1, 995, 10));
        // Neither
        assert!(!policy.must_evict(2, 500, 10));
    }

    #[test]
    fn test_admit_rejects_oversize() {
        let policy = CapacityPolicy::new(Some(64), None);
        assert!(policy.admit(64).is_ok());
        assert!(matches!(
            policy.admit(65),
            Err(StorageError::DocumentTooLarge { size: 65, limit: 64 })
        ));

        let unbounded = CapacityPolicy::unbounded();
        assert!(matches!(
            unbounded.admit(MAX_DOCUMENT_SIZE + 1),
            Err(StorageError::DocumentTooLarge { .. })
        ));
    }

    #[test]
    fn test_from_options() {
        let capped = CapacityPolicy::from_options(&CollectionOptions::capped(4096).with_max(10));
        assert_eq!(capped.max_bytes(), Some(4096));
        assert_eq!(capped.max_documents(), Some(10));

        let plain = CapacityPolicy::from_options(&CollectionOptions::uncapped());
        assert_eq!(plain, CapacityPolicy::unbounded());
    }
}
