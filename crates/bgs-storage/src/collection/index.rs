//! Compound index specifications

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::lookup;
use super::keys::encode_field;
use crate::error::StorageError;

/// Reserved field path resolving to the store-assigned document id
pub const ID_FIELD: &str = "_id";

/// Direction of one index component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// The conventional `1` / `-1` direction marker
    pub fn as_i8(self) -> i8 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// One component of a compound index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexField {
    /// Dotted path into the document, or [`ID_FIELD`]
    pub path: String,
    pub order: SortOrder,
}

/// A named compound index
///
/// ```rust,ignore
/// let spec = IndexSpec::new().asc("room").desc("_id");
/// assert_eq!(spec.name(), "room_1__id_-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IndexSpec {
    fields: Vec<IndexField>,
    name: Option<String>,
}

impl IndexSpec {
    /// Create an empty spec; add components with [`asc`](Self::asc) and [`desc`](Self::desc)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ascending component
    pub fn asc(mut self, path: impl Into<String>) -> Self {
        self.fields.push(IndexField {
            path: path.into(),
            order: SortOrder::Ascending,
        });
        self
    }

    /// Append a descending component
    pub fn desc(mut self, path: impl Into<String>) -> Self {
        self.fields.push(IndexField {
            path: path.into(),
            order: SortOrder::Descending,
        });
        self
    }

    /// Use an explicit name instead of the generated one
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Index components in order
    pub fn fields(&self) -> &[IndexField] {
        &self.fields
    }

    /// Explicit name, or `path_dir` pairs joined by `_` (e.g. `room_1__id_-1`)
    pub fn name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.fields
            .iter()
            .map(|f| format!("{}_{}", f.path, f.order.as_i8()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Whether two specs index the same components in the same order
    pub fn same_key_pattern(&self, other: &IndexSpec) -> bool {
        self.fields == other.fields
    }

    pub(crate) fn validate(&self) -> Result<(), StorageError> {
        if self.fields.is_empty() {
            return Err(StorageError::InvalidIndex("index has no fields".into()));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.path.is_empty() || field.path.split('.').any(str::is_empty) {
                return Err(StorageError::InvalidIndex(format!(
                    "malformed field path {:?}",
                    field.path
                )));
            }
            if self.fields[..i].iter().any(|f| f.path == field.path) {
                return Err(StorageError::InvalidIndex(format!(
                    "field {} appears twice",
                    field.path
                )));
            }
        }
        if self.name().is_empty() {
            return Err(StorageError::InvalidIndex("index name is empty".into()));
        }
        Ok(())
    }

    /// Encode the indexed components of a document
    pub(crate) fn encode_document(&self, id: u64, document: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        for field in &self.fields {
            if field.path == ID_FIELD {
                encode_field(&mut buf, &Value::from(id), field.order);
            } else {
                encode_field(&mut buf, lookup(document, &field.path), field.order);
            }
        }
        buf
    }

    /// Number of leading components matched by a set of equality paths
    ///
    /// Returns `Some(n)` when the paths are exactly the first `n` components
    /// (in any order), `None` otherwise.
    pub(crate) fn prefix_match(&self, paths: &[&str]) -> Option<usize> {
        let n = paths.len();
        if n > self.fields.len() {
            return None;
        }
        let leading = &self.fields[..n];
        paths
            .iter()
            .all(|p| leading.iter().any(|f| f.path == *p))
            .then_some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_names() {
        assert_eq!(IndexSpec::new().asc("room").desc("_id").name(), "room_1__id_-1");
        assert_eq!(
            IndexSpec::new().asc("author.id").desc("_id").name(),
            "author.id_1__id_-1"
        );
        assert_eq!(
            IndexSpec::new().asc("user").desc("createdAt").name(),
            "user_1_createdAt_-1"
        );
        assert_eq!(IndexSpec::new().asc("x").named("by_x").name(), "by_x");
    }

    #[test]
    fn test_validate() {
        assert!(IndexSpec::new().validate().is_err());
        assert!(IndexSpec::new().asc("a..b").validate().is_err());
        assert!(IndexSpec::new().asc("a").desc("a").validate().is_err());
        assert!(IndexSpec::new().asc("a").desc("_id").validate().is_ok());
    }

    #[test]
    fn test_prefix_match() {
        let spec = IndexSpec::new().asc("game").desc("version");
        assert_eq!(spec.prefix_match(&[]), Some(0));
        assert_eq!(spec.prefix_match(&["game"]), Some(1));
        assert_eq!(spec.prefix_match(&["version", "game"]), Some(2));
        assert_eq!(spec.prefix_match(&["version"]), None);
        assert_eq!(spec.prefix_match(&["game", "version", "label"]), None);
    }

    #[test]
    fn test_encode_document_uses_id_and_paths() {
        let spec = IndexSpec::new().asc("author.id").desc("_id");
        let doc = json!({ "author": { "id": "u1" } });
        let newer = spec.encode_document(2, &doc);
        let older = spec.encode_document(1, &doc);
        assert!(newer < older);

        // Missing fields index as null
        let system = spec.encode_document(3, &json!({ "author": null }));
        assert!(system < older);
    }

    #[test]
    fn test_same_key_pattern_ignores_name() {
        let a = IndexSpec::new().asc("room").desc("_id");
        let b = IndexSpec::new().asc("room").desc("_id").named("custom");
        let c = IndexSpec::new().asc("room").asc("_id");
        assert!(a.same_key_pattern(&b));
        assert!(!a.same_key_pattern(&c));
    }
}
