// hasher.rs — SHA-256 hashing utilities.
//
// All hashes in Tool Gate are SHA-256, lowercase hex. This module hashes
// bytes, strings, files, and JSON values (through their canonical form).

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::canonical::canonical_json;
use crate::error::LedgerError;

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Hash the contents of a file on disk.
pub fn hash_file(path: &Path) -> Result<String, LedgerError> {
    let data = std::fs::read(path).map_err(|source| LedgerError::HashFileFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hash_bytes(&data))
}

/// Hash a JSON value through its canonical serialization.
///
/// Two values that differ only in object key order hash identically.
pub fn hash_value(value: &serde_json::Value) -> String {
    hash_str(&canonical_json(value))
}

/// Fingerprint of a tool call: binds a confirmation token to one exact
/// (tool, arguments) pair.
pub fn scope_key(tool: &str, args: &serde_json::Value) -> String {
    hash_value(&serde_json::json!({ "tool": tool, "args": args }))
}
