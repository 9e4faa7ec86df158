// request.rs — Tool call requests and their outcomes.
//
// Requests arrive as JSON from an agent:
//
//   { "tool": "filesystem.writeFile", "action": "write", "domain": "general",
//     "args": { "path": "notes.txt", "content": "hi" },
//     "confirmToken": "c_...", "justification": "..." }
//
// Unknown fields are kept as annotations. Annotations are recorded nowhere
// and consulted by no rule: a polite justification changes nothing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One proposed tool call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolRequest {
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub args: Value,
    #[serde(
        default,
        rename = "confirmToken",
        alias = "confirm_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub confirm_token: Option<String>,
    #[serde(flatten)]
    pub annotations: Map<String, Value>,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>, action: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            action: action.into(),
            domain: domain.into(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_confirm_token(mut self, token: impl Into<String>) -> Self {
        self.confirm_token = Some(token.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: Value) -> Self {
        self.annotations.insert(key.into(), value);
        self
    }

    /// Structural checks done before any rule runs. Empty domain and action
    /// are left to the evaluators; a request without a tool, or with
    /// non-object arguments, is malformed.
    pub fn validate(&self) -> Result<(), String> {
        if self.tool.trim().is_empty() {
            return Err("missing tool name".to_string());
        }
        if !(self.args.is_object() || self.args.is_null()) {
            return Err("args must be a JSON object".to_string());
        }
        if self.confirm_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err("confirmToken must not be empty".to_string());
        }
        Ok(())
    }

    /// Arguments as passed to the operation: a missing payload is `{}`.
    pub fn effective_args(&self) -> Value {
        if self.args.is_null() {
            Value::Object(Map::new())
        } else {
            self.args.clone()
        }
    }
}

/// Returned instead of executing when the call needs confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingConfirmation {
    pub needs_confirmation: bool,
    pub confirm_token: String,
    pub reason: String,
}

/// What a successful `submit` produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Outcome {
    /// The operation ran; its receipt is in the ledger.
    Executed {
        result: Value,
        #[serde(rename = "receiptHash")]
        receipt_hash: String,
    },
    /// Resubmit the same call with `confirm_token` to execute it.
    Pending(PendingConfirmation),
}

impl Outcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending(_))
    }

    pub fn confirm_token(&self) -> Option<&str> {
        match self {
            Outcome::Pending(p) => Some(&p.confirm_token),
            Outcome::Executed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_camel_case_token_and_keeps_annotations() {
        let req: ToolRequest = serde_json::from_value(json!({
            "tool": "filesystem.writeFile",
            "action": "write",
            "domain": "general",
            "args": { "path": "a.txt" },
            "confirmToken": "c_abc",
            "justification": "trust me"
        }))
        .unwrap();
        assert_eq!(req.confirm_token.as_deref(), Some("c_abc"));
        assert_eq!(req.annotations["justification"], "trust me");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn snake_case_token_alias() {
        let req: ToolRequest =
            serde_json::from_value(json!({ "tool": "t", "confirm_token": "c_1" })).unwrap();
        assert_eq!(req.confirm_token.as_deref(), Some("c_1"));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let req: ToolRequest = serde_json::from_value(json!({ "tool": "t" })).unwrap();
        assert_eq!(req.domain, "");
        assert_eq!(req.action, "");
        assert_eq!(req.effective_args(), json!({}));
    }

    #[test]
    fn malformed_requests() {
        assert!(ToolRequest::default().validate().is_err());
        assert!(ToolRequest::new("t", "read", "d")
            .with_args(json!([1, 2]))
            .validate()
            .is_err());
        assert!(ToolRequest::new("t", "read", "d")
            .with_confirm_token(" ")
            .validate()
            .is_err());
    }

    #[test]
    fn pending_serializes_camel_case() {
        let pending = Outcome::Pending(PendingConfirmation {
            needs_confirmation: true,
            confirm_token: "c_1".into(),
            reason: "confirmation_required".into(),
        });
        assert_eq!(
            serde_json::to_value(&pending).unwrap(),
            json!({
                "needsConfirmation": true,
                "confirmToken": "c_1",
                "reason": "confirmation_required"
            })
        );
        assert_eq!(pending.confirm_token(), Some("c_1"));
    }
}
