//! SHA-256 helpers and canonical JSON.
//!
//! Canonical JSON is compact `serde_json` output with every object's keys
//! sorted, so the same logical document always hashes to the same digest
//! regardless of struct field order or map insertion order.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::BeatreelResult;

/// Bytes read from the head of a file for a partial content hash.
pub const PARTIAL_HASH_BYTES: usize = 64 * 1024;

/// Lowercase hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("{:x}", Sha256::digest(bytes.as_ref()))
}

/// Streamed SHA-256 of a whole file.
pub fn sha256_file(path: &Path) -> BeatreelResult<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash of the first 64 KiB of a file plus its total size.
///
/// Fast identity for large images: two files differing only past the first
/// 64 KiB and with equal size collide, which callers accept.
pub fn partial_content_hash(path: &Path) -> BeatreelResult<String> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut head = Vec::with_capacity(PARTIAL_HASH_BYTES);
    file.take(PARTIAL_HASH_BYTES as u64).read_to_end(&mut head)?;

    let mut hasher = Sha256::new();
    hasher.update(&head);
    hasher.update(size.to_le_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Serialize `value` as compact JSON with recursively sorted object keys.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> BeatreelResult<String> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&sort_keys(value))?)
}

/// SHA-256 hex of a document's canonical JSON.
pub fn canonical_hash<T: Serialize + ?Sized>(value: &T) -> BeatreelResult<String> {
    Ok(sha256_hex(canonical_json(value)?))
}

/// `sha256:<hex>` form used for document identifiers such as `edl_hash`.
pub fn prefixed(hex: &str) -> String {
    format!("sha256:{hex}")
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
