// error.rs — Error types for the filesystem connector.

use std::path::PathBuf;
use thiserror::Error;
use tg_gate::OperationError;

/// Errors that can occur during filesystem connector operations.
#[derive(Debug, Error)]
pub enum FsConnectorError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A path traversal attempt was detected.
    #[error("path traversal detected: '{path}'")]
    PathTraversal { path: String },

    /// The path lies inside a directory the sandbox protects.
    #[error("path is protected: '{path}'")]
    Protected { path: String },

    /// The arguments are missing a field or have the wrong type.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

impl From<FsConnectorError> for OperationError {
    fn from(e: FsConnectorError) -> Self {
        match e {
            FsConnectorError::PathTraversal { .. }
            | FsConnectorError::Protected { .. }
            | FsConnectorError::InvalidArguments(_) => {
                OperationError::InvalidArguments {
                    reason: e.to_string(),
                }
            }
            FsConnectorError::IoError { .. } => OperationError::Failed {
                reason: e.to_string(),
            },
        }
    }
}
