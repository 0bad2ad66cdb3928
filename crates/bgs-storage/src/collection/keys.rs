//! Key layouts and order-preserving value encoding
//!
//! All collections share the `documents` and `index_entries` tables. Keys are
//! scoped by a length-prefixed collection name so a prefix scan never leaks
//! into a neighbouring collection:
//!
//! ```text
//! documents:      [u16 len][name][u64 id BE]                       -> json
//! index_entries:  [u16 len][name][u16 len][index][field...][u64 id] -> id
//! ```
//!
//! Each indexed field is encoded so that byte order equals value order.
//! Every field encoding is prefix-free, so descending fields are produced by
//! complementing the ascending bytes.
//!
//! Numbers carry their ordered `f64` bits followed by an exact 128-bit
//! integer part. Integers beyond 2^53 that round to the same `f64` (large
//! `_id`s included) still get distinct keys, and `2` and `2.0` share one.

use serde_json::{Number, Value};

use super::index::SortOrder;

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x10;
const TAG_TRUE: u8 = 0x11;
const TAG_NUMBER: u8 = 0x20;
const TAG_STRING: u8 = 0x30;
const TAG_COMPOSITE: u8 = 0x40;

fn push_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Prefix shared by every document of a collection
pub(crate) fn collection_prefix(collection: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + collection.len() + 8);
    push_len_prefixed(&mut key, collection.as_bytes());
    key
}

/// Key of a single document
pub(crate) fn document_key(collection: &str, id: u64) -> Vec<u8> {
    let mut key = collection_prefix(collection);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Inclusive bounds covering every document of a collection
pub(crate) fn document_bounds(collection: &str) -> (Vec<u8>, Vec<u8>) {
    (document_key(collection, 0), document_key(collection, u64::MAX))
}

/// Extract the document id from a document key
pub(crate) fn id_from_document_key(key: &[u8]) -> Option<u64> {
    let tail: [u8; 8] = key.get(key.len().checked_sub(8)?..)?.try_into().ok()?;
    Some(u64::from_be_bytes(tail))
}

/// Prefix shared by every entry of one index
pub(crate) fn index_prefix(collection: &str, index: &str) -> Vec<u8> {
    let mut key = collection_prefix(collection);
    push_len_prefixed(&mut key, index.as_bytes());
    key
}

/// Full key of one index entry
pub(crate) fn index_entry_key(collection: &str, index: &str, fields: &[u8], id: u64) -> Vec<u8> {
    let mut key = index_prefix(collection, index);
    key.extend_from_slice(fields);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Append the encoding of `value` in the given order
pub(crate) fn encode_field(buf: &mut Vec<u8>, value: &Value, order: SortOrder) {
    let start = buf.len();
    encode_ascending(buf, value);
    if order == SortOrder::Descending {
        for byte in &mut buf[start..] {
            *byte = !*byte;
        }
    }
}

fn encode_ascending(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(false) => buf.push(TAG_FALSE),
        Value::Bool(true) => buf.push(TAG_TRUE),
        Value::Number(n) => {
            buf.push(TAG_NUMBER);
            let (approx, exact) = number_parts(n);
            buf.extend_from_slice(&ordered_f64_bits(approx).to_be_bytes());
            buf.extend_from_slice(&((exact as u128) ^ (1 << 127)).to_be_bytes());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            encode_bytes(buf, s.as_bytes());
        }
        Value::Array(_) | Value::Object(_) => {
            // Composite values are indexed by their canonical text; equality
            // lookups work, range order carries no meaning.
            buf.push(TAG_COMPOSITE);
            encode_bytes(buf, value.to_string().as_bytes());
        }
    }
}

/// Escape 0x00 as 0x00 0xFF and terminate with 0x00 0x00
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        buf.push(b);
        if b == 0x00 {
            buf.push(0xFF);
        }
    }
    buf.extend_from_slice(&[0x00, 0x00]);
}

/// Nearest `f64` plus the exact integer value
///
/// Non-integral floats never tie with an integer on the `f64` part, so their
/// integer part is left at zero.
pub(crate) fn number_parts(n: &Number) -> (f64, i128) {
    if let Some(i) = n.as_i64() {
        return (i as f64, i as i128);
    }
    if let Some(u) = n.as_u64() {
        return (u as f64, u as i128);
    }
    let f = n.as_f64().unwrap_or(0.0);
    let exact = if f.is_finite() && f.fract() == 0.0 { f as i128 } else { 0 };
    (f, exact)
}

/// Map an f64 onto a u64 whose unsigned order matches numeric order
fn ordered_f64_bits(f: f64) -> u64 {
    // Fold -0.0 into 0.0 so equal numbers share one encoding
    let f = if f == 0.0 { 0.0 } else { f };
    let bits = f.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits ^ (1 << 63)
    }
}
