// config.rs — Gate configuration.
//
// GateConfig determines where the gate keeps its state: receipts,
// confirmation tokens, and the integrity manifest with its signature and
// public key. `for_project()` lays everything out under `.toolgate/` in the
// project root; `load()` additionally overlays `.toolgate/gate.toml`.
//
// Example gate.toml:
//
//   confirmation_ttl_secs = 300
//   require_signed_manifest = true
//   rules_file = "rules.yaml"
//   integrity_targets = ["rules.yaml", ".toolgate/gate.toml"]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tg_policy::RuleTable;

use crate::error::GateError;

/// Options read from `gate.toml`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateOptions {
    /// Expire confirmation tokens after this many seconds. None = never.
    #[serde(default)]
    pub confirmation_ttl_secs: Option<u64>,

    /// Require a valid Ed25519 signature on the integrity manifest.
    #[serde(default)]
    pub require_signed_manifest: bool,

    /// Replay the whole receipt chain when the gate starts, and refuse to
    /// start if it is broken.
    #[serde(default = "default_true")]
    pub verify_chain_on_open: bool,

    /// YAML rule table, relative to the project root. None = built-in pack.
    #[serde(default)]
    pub rules_file: Option<PathBuf>,

    /// Artifacts `tg integrity generate` hashes when none are given.
    #[serde(default)]
    pub integrity_targets: Vec<String>,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            confirmation_ttl_secs: None,
            require_signed_manifest: false,
            verify_chain_on_open: default_true(),
            rules_file: None,
            integrity_targets: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Configuration for one gate instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Root directory of the project; manifest paths are relative to it.
    pub project_root: PathBuf,

    /// `.toolgate/` under the project root.
    pub state_dir: PathBuf,

    /// Receipt log, head pointer, per-record snapshots.
    pub receipts_dir: PathBuf,

    /// Outstanding confirmation tokens.
    pub confirmations_file: PathBuf,

    pub manifest_path: PathBuf,
    pub signature_path: PathBuf,
    pub public_key_path: PathBuf,

    #[serde(default)]
    pub options: GateOptions,
}

impl GateConfig {
    /// Create a config with the standard `.toolgate/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let state_dir = root.join(".toolgate");
        let integrity_dir = state_dir.join("integrity");
        Self {
            project_root: root,
            receipts_dir: state_dir.join("receipts"),
            confirmations_file: state_dir.join("confirmations.json"),
            manifest_path: integrity_dir.join("manifest.json"),
            signature_path: integrity_dir.join("manifest.sig"),
            public_key_path: integrity_dir.join("public.key"),
            state_dir,
            options: GateOptions::default(),
        }
    }

    /// Path of the optional options file.
    pub fn options_path(&self) -> PathBuf {
        self.state_dir.join("gate.toml")
    }

    /// `for_project` plus `.toolgate/gate.toml` when it exists.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, GateError> {
        let mut config = Self::for_project(project_root);
        let path = config.options_path();
        if !path.exists() {
            return Ok(config);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| GateError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        config.options = toml::from_str(&content).map_err(|e| GateError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!("loaded gate options from {}", path.display());
        Ok(config)
    }

    /// Builder: replace the options.
    pub fn with_options(mut self, options: GateOptions) -> Self {
        self.options = options;
        self
    }

    /// The rule table: the configured YAML file, or the built-in pack.
    pub fn rule_table(&self) -> Result<RuleTable, GateError> {
        match &self.options.rules_file {
            Some(file) => Ok(RuleTable::load(self.project_root.join(file))?),
            None => Ok(RuleTable::default()),
        }
    }

    pub fn confirmation_ttl(&self) -> Option<chrono::Duration> {
        self.options
            .confirmation_ttl_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .map(chrono::Duration::seconds)
    }
}
