// error.rs — Error types for the gate kernel.
//
// Every way `submit` can fail maps to a stable machine-readable code via
// `GateError::code()`; callers (and the CLI) branch on the code, not on the
// Display text.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::operation::OperationError;

/// Errors returned by the gate kernel.
#[derive(Debug, Error)]
pub enum GateError {
    /// The request could not be parsed or is missing its tool name.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The tool is not on the allow-list or has no bound operation.
    #[error("unauthorized tool: {tool}")]
    UnauthorizedTool { tool: String },

    /// The composed verdict refused the call.
    #[error("refused: {reason}")]
    Refused { reason: String },

    /// The confirmation token is unknown, already used, expired, or was
    /// issued for a different call.
    #[error("invalid or already used confirmation token")]
    InvalidConfirmation,

    /// The startup integrity check failed; the gate decides nothing.
    #[error("integrity failure: {0}")]
    Integrity(Arc<tg_integrity::IntegrityError>),

    /// The operation itself failed (or rejected the capability).
    #[error("operation failed: {0}")]
    Operation(#[from] OperationError),

    /// Reading or writing the receipt ledger failed.
    #[error("receipt ledger error: {0}")]
    Ledger(#[from] tg_audit::LedgerError),

    /// Issuing or redeeming a confirmation failed.
    #[error("confirmation store error: {0}")]
    Confirmation(#[from] tg_confirm::ConfirmError),

    /// The operation ran but its receipt is not linked into the chain. If
    /// nothing reached the log the draft was parked and is appended when the
    /// ledger next opens or appends; a record that did reach the log is never
    /// parked again.
    #[error("operation executed but its receipt was deferred: {source}")]
    ReceiptDeferred {
        result: Value,
        source: tg_audit::LedgerError,
    },

    /// The rule table could not be loaded.
    #[error("policy error: {0}")]
    Policy(#[from] tg_policy::PolicyError),

    /// The gate configuration is unreadable or invalid.
    #[error("invalid gate configuration at {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl GateError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> String {
        match self {
            GateError::InvalidInput { .. } => "invalid_input".to_string(),
            GateError::UnauthorizedTool { .. } => "unauthorized_tool".to_string(),
            GateError::Refused { reason } => format!("refused:{}", reason),
            GateError::InvalidConfirmation => "invalid_confirmation".to_string(),
            GateError::Integrity(_) => "integrity_failure".to_string(),
            GateError::Operation(OperationError::CapabilityMismatch) => {
                "capability_mismatch".to_string()
            }
            GateError::Operation(_) => "operation_failed".to_string(),
            GateError::Ledger(_) => "ledger_error".to_string(),
            GateError::Confirmation(_) => "confirmation_store_error".to_string(),
            GateError::ReceiptDeferred { .. } => "receipt_deferred".to_string(),
            GateError::Policy(_) | GateError::Config { .. } => "config_error".to_string(),
        }
    }

    /// The refusal reason, for refusals (including unauthorized tools).
    pub fn refusal_reason(&self) -> Option<&str> {
        match self {
            GateError::InvalidInput { .. } => Some("invalid_input"),
            GateError::UnauthorizedTool { .. } => Some("unauthorized_tool"),
            GateError::Refused { reason } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            GateError::Refused {
                reason: "refuse_domain".into()
            }
            .code(),
            "refused:refuse_domain"
        );
        assert_eq!(
            GateError::Operation(OperationError::CapabilityMismatch).code(),
            "capability_mismatch"
        );
        assert_eq!(
            GateError::Operation(OperationError::Failed {
                reason: "disk full".into()
            })
            .code(),
            "operation_failed"
        );
        assert_eq!(GateError::InvalidConfirmation.code(), "invalid_confirmation");
    }

    #[test]
    fn refusal_reason() {
        let err = GateError::UnauthorizedTool {
            tool: "filesystem.deleteFile".into(),
        };
        assert_eq!(err.refusal_reason(), Some("unauthorized_tool"));
        assert_eq!(GateError::InvalidConfirmation.refusal_reason(), None);
    }
}
