// error.rs — Error types for the policy subsystem.
//
// Evaluation itself is total and never returns an error. These variants
// cover loading the external rule table.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a rule table.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The rule table file could not be read.
    #[error("failed to read rule table at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The rule table is not valid YAML or does not match the schema.
    #[error("invalid rule table: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The rule table parsed but violates a structural requirement.
    #[error("invalid rule table: {reason}")]
    Invalid { reason: String },
}
