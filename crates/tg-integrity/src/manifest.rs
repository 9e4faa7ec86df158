// manifest.rs — The integrity manifest: expected SHA-256 of each trusted artifact.
//
// On disk (`integrity/manifest.json`):
//   { "version": 1, "files": { "rules.yaml": "<sha256>", ... } }
//
// Paths are relative to the project root and may not escape it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tg_audit::hasher;

use crate::error::IntegrityError;

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityManifest {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Artifact path (relative to the root) → lowercase hex SHA-256.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl Default for IntegrityManifest {
    fn default() -> Self {
        Self {
            version: default_version(),
            files: BTreeMap::new(),
        }
    }
}

impl IntegrityManifest {
    /// Parse manifest bytes. `path` is only used for error messages.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, IntegrityError> {
        serde_json::from_slice(bytes).map_err(|e| IntegrityError::ManifestInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read the raw manifest bytes. A missing file is `ManifestMissing`.
    pub fn read_bytes(path: &Path) -> Result<Vec<u8>, IntegrityError> {
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(IntegrityError::ManifestMissing {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(IntegrityError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn load(path: &Path) -> Result<Self, IntegrityError> {
        Self::from_bytes(&Self::read_bytes(path)?, path)
    }

    /// Hash each target (relative to `root`) into a new manifest.
    /// Every target must exist.
    pub fn generate<S: AsRef<str>>(root: &Path, targets: &[S]) -> Result<Self, IntegrityError> {
        let mut files = BTreeMap::new();
        for target in targets {
            let rel = target.as_ref();
            let abs = resolve(root, rel).ok_or_else(|| IntegrityError::MissingTarget {
                path: rel.to_string(),
            })?;
            let data = match fs::read(&abs) {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(IntegrityError::MissingTarget {
                        path: rel.to_string(),
                    })
                }
                Err(source) => return Err(IntegrityError::Io { path: abs, source }),
            };
            files.insert(rel.to_string(), hasher::hash_bytes(&data));
        }
        tracing::debug!("hashed {} manifest target(s) under {}", files.len(), root.display());
        Ok(Self {
            version: default_version(),
            files,
        })
    }

    /// Pretty JSON with a trailing newline: the exact bytes that get signed.
    pub fn to_pretty_json(&self) -> Result<String, IntegrityError> {
        Ok(format!("{}\n", serde_json::to_string_pretty(self)?))
    }

    pub fn write(&self, path: &Path) -> Result<(), IntegrityError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| IntegrityError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, self.to_pretty_json()?).map_err(|source| IntegrityError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Join a manifest path onto the root, refusing absolute paths and `..`.
pub(crate) fn resolve(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel_path = Path::new(rel);
    let confined = !rel.is_empty()
        && rel_path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    confined.then(|| root.join(rel_path))
}
