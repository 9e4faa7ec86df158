// error.rs — Error types for the integrity verifier.

use std::path::PathBuf;
use thiserror::Error;

use crate::verify::ArtifactFailure;

#[derive(Debug, Error)]
pub enum IntegrityError {
    /// No manifest at the configured path.
    #[error("integrity manifest missing: {path}")]
    ManifestMissing { path: PathBuf },

    /// The manifest exists but is not a valid manifest document.
    #[error("invalid integrity manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    /// The manifest lists no artifacts.
    #[error("integrity manifest has no files")]
    EmptyManifest,

    /// One or more artifacts are missing or altered.
    #[error("integrity check failed: {}", summarize(.failures))]
    Failed { failures: Vec<ArtifactFailure> },

    /// The detached manifest signature did not verify.
    #[error("manifest signature verification failed")]
    SignatureInvalid,

    /// A key or signature file could not be decoded.
    #[error("invalid key material in {path}: {reason}")]
    KeyInvalid { path: PathBuf, reason: String },

    /// A manifest target to hash does not exist.
    #[error("missing file for integrity manifest: {path}")]
    MissingTarget { path: String },

    /// Failed to read or write a file.
    #[error("integrity I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn summarize(failures: &[ArtifactFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.path, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}
