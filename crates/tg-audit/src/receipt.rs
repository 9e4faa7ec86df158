// receipt.rs — Receipt data model.
//
// Every decision the gate makes (refusal, pending confirmation, execution)
// is recorded as a Receipt. Receipts form a chain: each one carries the hash
// of its predecessor in `prev_hash`, and its own `hash` covers every other
// field including `prev_hash`. The first receipt links to GENESIS.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tg_policy::Action;
use uuid::Uuid;

use crate::canonical::canonical_json;
use crate::hasher;

/// The `prev_hash` of the first receipt in a chain.
pub const GENESIS: &str = "GENESIS";

/// What happened to the call after the decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptOutcome {
    /// The operation did not run (refused, or waiting for confirmation).
    Blocked,
    /// The operation ran and returned successfully.
    Executed,
}

/// Everything the caller supplies for a receipt; the ledger fills in the
/// id, timestamp, and chain fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptDraft {
    pub policy_version: String,
    pub decision: Action,
    pub reason: String,
    pub domain: Option<String>,
    pub action: Option<String>,
    pub tool: Option<String>,
    /// Canonical digest of the call arguments. Arguments are never stored verbatim.
    pub args_digest: String,
    pub outcome: ReceiptOutcome,
}

impl ReceiptDraft {
    pub fn new(
        policy_version: impl Into<String>,
        decision: Action,
        reason: impl Into<String>,
        outcome: ReceiptOutcome,
    ) -> Self {
        Self {
            policy_version: policy_version.into(),
            decision,
            reason: reason.into(),
            domain: None,
            action: None,
            tool: None,
            args_digest: hasher::hash_value(&Value::Null),
            outcome,
        }
    }

    /// Set the tool name and return self (builder pattern).
    /// Empty names are recorded as absent.
    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tool = non_empty(tool);
        self
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = non_empty(domain);
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = non_empty(action);
        self
    }

    /// Record the digest of the call arguments.
    pub fn with_args(mut self, args: &Value) -> Self {
        self.args_digest = hasher::hash_value(args);
        self
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// A chained receipt — one line in the JSONL receipt log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub policy_version: String,
    pub decision: Action,
    pub reason: String,
    pub domain: Option<String>,
    pub action: Option<String>,
    pub tool: Option<String>,
    pub args_digest: String,
    pub outcome: ReceiptOutcome,
    /// Hash of the previous receipt, or GENESIS for the first one.
    pub prev_hash: String,
    /// SHA-256 over the canonical form of every other field.
    pub hash: String,
}

impl Receipt {
    /// Build a chained receipt from a draft, stamping it and computing its hash.
    pub fn chain(draft: ReceiptDraft, prev_hash: impl Into<String>) -> Result<Self, serde_json::Error> {
        let mut receipt = Self {
            receipt_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            policy_version: draft.policy_version,
            decision: draft.decision,
            reason: draft.reason,
            domain: draft.domain,
            action: draft.action,
            tool: draft.tool,
            args_digest: draft.args_digest,
            outcome: draft.outcome,
            prev_hash: prev_hash.into(),
            hash: String::new(),
        };
        receipt.hash = receipt.compute_hash()?;
        Ok(receipt)
    }

    /// Recompute this receipt's hash from its fields (ignoring the stored `hash`).
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        Ok(body_hash(&value).unwrap_or_default())
    }

    /// The canonical single-line form written to the log.
    pub fn to_canonical_line(&self) -> Result<String, serde_json::Error> {
        Ok(canonical_json(&serde_json::to_value(self)?))
    }

    /// Turn the receipt back into a draft (drops id, time and chain fields).
    pub fn to_draft(&self) -> ReceiptDraft {
        ReceiptDraft {
            policy_version: self.policy_version.clone(),
            decision: self.decision,
            reason: self.reason.clone(),
            domain: self.domain.clone(),
            action: self.action.clone(),
            tool: self.tool.clone(),
            args_digest: self.args_digest.clone(),
            outcome: self.outcome,
        }
    }
}

/// Hash a raw record value with its `hash` key removed.
///
/// Working on the raw value (not the typed struct) means any field an
/// attacker adds, removes, or edits changes the digest. Returns `None` if the
/// value is not a JSON object.
pub fn body_hash(record: &Value) -> Option<String> {
    let mut body = record.as_object()?.clone();
    body.remove("hash");
    Some(hasher::hash_value(&Value::Object(body)))
}
