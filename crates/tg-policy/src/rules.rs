// rules.rs — The static rule table.
//
// The rule table is read-only configuration: a domain deny-set, a tool
// allow-set, and the set of actions that require confirmation. It is loaded
// once (from YAML or the built-in default) and shared by every evaluation.
//
// Example rules.yaml:
//
//   version: v2
//   refuse_domains: [fraud]
//   allowed_tools: [filesystem.writeFile]
//   confirm_required_actions: [write]

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// The fixed rule table consulted by the evaluators.
///
/// `BTreeSet` keeps the sets sorted, so the `allowed_tools` constraint
/// attached to results is deterministic across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleTable {
    /// Version tag recorded in every receipt as `policy_version`.
    pub version: String,

    /// Domains that are refused outright.
    #[serde(default)]
    pub refuse_domains: BTreeSet<String>,

    /// Tools that may run at all. `None` disables the allow-list check.
    #[serde(default)]
    pub allowed_tools: Option<BTreeSet<String>>,

    /// Actions that are degraded until confirmed.
    #[serde(default)]
    pub confirm_required_actions: BTreeSet<String>,
}

impl RuleTable {
    /// Parse a rule table from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PolicyError> {
        let table: RuleTable = serde_yaml::from_str(yaml)?;
        table.validate()?;
        Ok(table)
    }

    /// Load a rule table from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| PolicyError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_yaml_str(&yaml)?;
        tracing::debug!(
            "loaded rule table {} from {}",
            table.version,
            path.display()
        );
        Ok(table)
    }

    /// Builder: replace the tool allow-list.
    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: replace the domain deny-set.
    pub fn with_refuse_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refuse_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: replace the confirmation-required action set.
    pub fn with_confirm_required_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.confirm_required_actions = actions.into_iter().map(Into::into).collect();
        self
    }

    fn validate(&self) -> Result<(), PolicyError> {
        if self.version.trim().is_empty() {
            return Err(PolicyError::Invalid {
                reason: "version must not be empty".to_string(),
            });
        }
        let blank = |set: &BTreeSet<String>| set.iter().any(|s| s.trim().is_empty());
        if blank(&self.refuse_domains)
            || blank(&self.confirm_required_actions)
            || self.allowed_tools.as_ref().is_some_and(blank)
        {
            return Err(PolicyError::Invalid {
                reason: "rule sets must not contain empty entries".to_string(),
            });
        }
        Ok(())
    }
}

/// The built-in rule pack: writes need confirmation, the "fraud" domain is
/// refused, and only `filesystem.writeFile` may run.
impl Default for RuleTable {
    fn default() -> Self {
        Self {
            version: "v2".to_string(),
            refuse_domains: BTreeSet::from(["fraud".to_string()]),
            allowed_tools: Some(BTreeSet::from(["filesystem.writeFile".to_string()])),
            confirm_required_actions: BTreeSet::from(["write".to_string()]),
        }
    }
}
