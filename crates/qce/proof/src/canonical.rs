//! Canonical serialization and hashing.

use crate::error::{ProofError, ProofResult};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// Canonical JSON bytes: object keys sorted at every depth, no whitespace.
///
/// Any value that serializes to the same JSON tree yields the same bytes,
/// whatever order its fields were built in.
pub fn canonical_json<T: Serialize>(value: &T) -> ProofResult<Vec<u8>> {
    let tree = sort_keys(serde_json::to_value(value)?);
    Ok(serde_json::to_vec(&tree)?)
}

/// Hex SHA-256 of the canonical JSON of `value`.
pub fn hash_canonical<T: Serialize>(value: &T) -> ProofResult<String> {
    Ok(hex::encode(Sha256::digest(canonical_json(value)?)))
}

/// Hex SHA-256 of a file, read in 64 KiB chunks.
pub fn hash_file(path: &Path) -> ProofResult<String> {
    if !path.is_file() {
        return Err(ProofError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let mut file = std::fs::File::open(path).map_err(|e| ProofError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).map_err(|e| ProofError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(String, Value)> = fields.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
