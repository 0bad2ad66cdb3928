//! Equality queries answered from compound indexes

use serde_json::Value;

use super::document::lookup;
use super::index::{ID_FIELD, IndexSpec};
use super::keys::{encode_field, number_parts};

/// Equality filter over document fields with an optional result limit
///
/// Results come back in the order of the index chosen to answer the query,
/// so for the log indexes (partition ascending, recency descending) the
/// newest matching records come first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<(String, Value)>,
    limit: Option<usize>,
}

impl Query {
    /// Match every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `path` to equal `value`; repeating a path replaces its value
    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        let path = path.into();
        let value = value.into();
        match self.filters.iter_mut().find(|(p, _)| *p == path) {
            Some(existing) => existing.1 = value,
            None => self.filters.push((path, value)),
        }
        self
    }

    /// Return at most `limit` documents
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    pub fn max_results(&self) -> Option<usize> {
        self.limit
    }

    /// Pick the first index whose leading components are exactly the filtered paths
    ///
    /// An unfiltered query has no partition to scan and is answered in
    /// reverse insertion order instead.
    pub(crate) fn plan<'a>(&self, indexes: &'a [IndexSpec]) -> Option<&'a IndexSpec> {
        if self.filters.is_empty() {
            return None;
        }
        let paths: Vec<&str> = self.filters.iter().map(|(p, _)| p.as_str()).collect();
        indexes.iter().find(|spec| spec.prefix_match(&paths).is_some())
    }

    /// Encoded key prefix for `spec`, which must have been chosen by [`plan`](Self::plan)
    pub(crate) fn encoded_prefix(&self, spec: &IndexSpec) -> Vec<u8> {
        let mut buf = Vec::new();
        for field in &spec.fields()[..self.filters.len()] {
            if let Some((_, value)) = self.filters.iter().find(|(p, _)| *p == field.path) {
                encode_field(&mut buf, value, field.order);
            }
        }
        buf
    }

    /// Evaluate the filters directly against a stored document
    pub(crate) fn matches(&self, id: u64, document: &Value) -> bool {
        self.filters.iter().all(|(path, expected)| {
            if path == ID_FIELD {
                expected.as_u64() == Some(id)
            } else {
                values_equal(lookup(document, path), expected)
            }
        })
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_parts(x) == number_parts(y),
        _ => a == b,
    }
}
