// error.rs — Error types for confirmation stores.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfirmError {
    /// A token must be bound to a non-empty scope key.
    #[error("confirmation scope key must not be empty")]
    EmptyScope,

    /// Failed to read or write the token file.
    #[error("confirmation store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize the token table.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store lock was poisoned by a panicking writer.
    #[error("confirmation store lock poisoned")]
    LockPoisoned,
}
