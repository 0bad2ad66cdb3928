//! Document encoding and field access

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::StorageError;

static NULL: Value = Value::Null;

/// A document serialized for storage
#[derive(Debug)]
pub(crate) struct EncodedDocument {
    pub value: Value,
    pub bytes: Vec<u8>,
}

impl EncodedDocument {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Serialize and validate a document
///
/// Documents must be JSON objects whose keys contain no `.` and do not start
/// with `$`, at any depth.
pub(crate) fn encode<T: Serialize>(document: &T) -> Result<EncodedDocument, StorageError> {
    let value =
        serde_json::to_value(document).map_err(|e| StorageError::serialization(e.to_string()))?;
    if !value.is_object() {
        return Err(StorageError::invalid_document(
            "document must serialize to an object",
        ));
    }
    check_keys(&value, &mut String::new())?;
    let bytes =
        serde_json::to_vec(&value).map_err(|e| StorageError::serialization(e.to_string()))?;
    Ok(EncodedDocument { value, bytes })
}

/// Decode stored bytes into a typed document
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::deserialization(e.to_string()))
}

/// Decode stored bytes into a generic value
pub(crate) fn decode_value(bytes: &[u8]) -> Result<Value, StorageError> {
    decode(bytes)
}

fn check_keys(value: &Value, path: &mut String) -> Result<(), StorageError> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.contains('.') {
                    return Err(StorageError::invalid_document(format!(
                        "field name {:?} under {:?} contains '.'",
                        key,
                        display_path(path)
                    )));
                }
                if key.starts_with('$') {
                    return Err(StorageError::invalid_document(format!(
                        "field name {:?} under {:?} starts with '$'",
                        key,
                        display_path(path)
                    )));
                }
                let len = path.len();
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
                check_keys(child, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(|item| check_keys(item, path)),
        _ => Ok(()),
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

/// Resolve a dotted path; missing fields resolve to null
pub(crate) fn lookup<'a>(document: &'a Value, path: &str) -> &'a Value {
    let mut current = document;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return &NULL,
        }
    }
    current
}
