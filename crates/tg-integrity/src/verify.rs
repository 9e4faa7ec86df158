// verify.rs — Compare trusted artifacts against the manifest.
//
// Every listed artifact is checked; failures are collected, not
// short-circuited, so one report names everything that is missing or
// altered.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tg_audit::hasher;

use crate::error::IntegrityError;
use crate::manifest::{resolve, IntegrityManifest};

/// Why an artifact failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    MissingFile,
    HashMismatch,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingFile => write!(f, "missing_file"),
            FailureReason::HashMismatch => write!(f, "hash_mismatch"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactFailure {
    pub path: String,
    pub expected: String,
    /// Digest actually found; `None` when the file is missing.
    pub actual: Option<String>,
    pub reason: FailureReason,
}

/// Successful verification summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub version: u32,
    pub count: usize,
}

/// Anything that can vouch for the gate's own artifacts at startup.
pub trait IntegrityCheck: Send + Sync {
    fn verify(&self) -> Result<IntegrityReport, IntegrityError>;
}

/// Verifies the artifacts under `root` against `manifest.json`.
pub struct ManifestVerifier {
    root: PathBuf,
    manifest_path: PathBuf,
}

impl ManifestVerifier {
    pub fn new(root: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest_path: manifest_path.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Check an already-loaded manifest against the files on disk.
    pub fn verify_manifest(
        &self,
        manifest: &IntegrityManifest,
    ) -> Result<IntegrityReport, IntegrityError> {
        if manifest.files.is_empty() {
            return Err(IntegrityError::EmptyManifest);
        }

        let mut failures = Vec::new();
        for (rel, expected) in &manifest.files {
            let actual = resolve(&self.root, rel).and_then(|abs| hasher::hash_file(&abs).ok());
            let Some(actual) = actual else {
                failures.push(ArtifactFailure {
                    path: rel.clone(),
                    expected: expected.clone(),
                    actual: None,
                    reason: FailureReason::MissingFile,
                });
                continue;
            };
            if !actual.eq_ignore_ascii_case(expected) {
                failures.push(ArtifactFailure {
                    path: rel.clone(),
                    expected: expected.clone(),
                    actual: Some(actual),
                    reason: FailureReason::HashMismatch,
                });
            }
        }

        if !failures.is_empty() {
            for f in &failures {
                tracing::warn!("integrity failure: {} ({})", f.path, f.reason);
            }
            return Err(IntegrityError::Failed { failures });
        }

        tracing::info!(
            "integrity verified: {} artifact(s), manifest v{}",
            manifest.files.len(),
            manifest.version
        );
        Ok(IntegrityReport {
            version: manifest.version,
            count: manifest.files.len(),
        })
    }
}

impl IntegrityCheck for ManifestVerifier {
    fn verify(&self) -> Result<IntegrityReport, IntegrityError> {
        let manifest = IntegrityManifest::load(&self.manifest_path)?;
        self.verify_manifest(&manifest)
    }
}
