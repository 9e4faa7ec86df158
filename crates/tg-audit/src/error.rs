// error.rs — Error types for the receipt ledger.
//
// Uses `thiserror` to derive the standard Rust `Error` trait automatically.
// Each variant maps to a specific failure mode in the audit pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::receipt::Receipt;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Failed to open or create a ledger file or directory.
    #[error("failed to open ledger storage at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read or write a ledger file.
    #[error("ledger I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize or deserialize a record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persisted head pointer disagrees with the log and cannot be reconciled.
    #[error("chain head is corrupt: {reason}")]
    CorruptHead { reason: String },

    /// The record is on the chain (line written, head moved) but its
    /// snapshot or `latest` pointer could not be written.
    #[error("receipt {} recorded but its snapshot failed: {source}", .receipt.hash)]
    SnapshotFailed {
        receipt: Box<Receipt>,
        source: Box<LedgerError>,
    },

    /// The line was written but the head moved before it could be linked.
    #[error("receipt {hash} written but not linked: head moved from {expected} to {actual}")]
    Unlinked {
        hash: String,
        expected: String,
        actual: String,
    },

    /// Verification on open found a broken chain.
    #[error("receipt chain is corrupted at index {index}: {kind}")]
    ChainCorrupted { index: usize, kind: String },

    /// The ledger lock was poisoned by a panicking writer.
    #[error("ledger lock poisoned")]
    LockPoisoned,

    /// Failed to read a file for hashing.
    #[error("failed to hash file at {path}: {source}")]
    HashFileFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl LedgerError {
    /// True when the record already reached the log. Appending the same
    /// draft again would record it twice.
    pub fn reached_log(&self) -> bool {
        matches!(
            self,
            LedgerError::SnapshotFailed { .. } | LedgerError::Unlinked { .. }
        )
    }
}
