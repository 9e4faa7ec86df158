// result.rs — Elementary results and composed verdicts.
//
// An ElementaryResult is what one rule evaluator says about one request.
// A Verdict is what the composer says after merging all of them. Both share
// the same shape; the verdict also records how it was composed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The three possible outcomes of a rule, ordered by severity.
///
/// The derive order matters: `Allowed < Degraded < Refused`, so `max()`
/// over a set of actions always yields the most restrictive one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// The call may proceed.
    Allowed,
    /// The call may proceed only after an explicit confirmation handshake.
    Degraded,
    /// The call must not proceed.
    Refused,
}

impl Action {
    /// Parse the wire name of an action. Unknown names return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "allowed" => Some(Action::Allowed),
            "degraded" => Some(Action::Degraded),
            "refused" => Some(Action::Refused),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allowed => "allowed",
            Action::Degraded => "degraded",
            Action::Refused => "refused",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A restriction attached to a result, carried through composition unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    /// The full set of tools the rule table permits.
    AllowedTools { tools: Vec<String> },
    /// The request did not have the expected shape.
    Shape { message: String },
    /// A constraint from loosely-typed evaluator output that has no typed form.
    Other { detail: Value },
}

/// The output of a single rule evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementaryResult {
    pub action: Action,
    /// Machine-readable reason code, e.g. `refuse_domain`.
    pub reason: String,
    /// Tags naming which parts of the request this result is about.
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ElementaryResult {
    fn new(action: Action, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
            scope: Vec::new(),
            constraints: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn allowed(reason: impl Into<String>) -> Self {
        Self::new(Action::Allowed, reason)
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::new(Action::Degraded, reason)
    }

    pub fn refused(reason: impl Into<String>) -> Self {
        Self::new(Action::Refused, reason)
    }

    /// Add a scope tag and return self (builder pattern). Duplicates are ignored.
    pub fn with_scope(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.scope.contains(&tag) {
            self.scope.push(tag);
        }
        self
    }

    /// Append a constraint and return self.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Set a metadata entry and return self.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Normalize loosely-typed evaluator output into a strict result.
    ///
    /// Never fails. Anything that cannot be read as one of the three actions
    /// becomes `refused`; a missing reason becomes `no_reason`; a scope or
    /// constraint list that is not an array is treated as empty.
    pub fn from_loose(raw: &Value) -> Self {
        let action = raw
            .get("action")
            .and_then(Value::as_str)
            .and_then(Action::parse)
            .unwrap_or(Action::Refused);

        let reason = raw
            .get("reason")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .unwrap_or("no_reason");

        let mut result = Self::new(action, reason);

        if let Some(tags) = raw.get("scope").and_then(Value::as_array) {
            for tag in tags.iter().filter_map(Value::as_str) {
                result = result.with_scope(tag);
            }
        }

        if let Some(items) = raw.get("constraints").and_then(Value::as_array) {
            result.constraints = items
                .iter()
                .map(|item| {
                    serde_json::from_value::<Constraint>(item.clone())
                        .unwrap_or_else(|_| Constraint::Other {
                            detail: item.clone(),
                        })
                })
                .collect();
        }

        // Accept both spellings used by ad-hoc evaluators.
        let meta = raw.get("metadata").or_else(|| raw.get("meta"));
        if let Some(Value::Object(map)) = meta {
            result.metadata = map.clone();
        }

        result
    }
}

/// How a verdict was composed from its inputs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Composition {
    And,
    Or,
}

/// The composed decision for one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub action: Action,
    pub reason: String,
    pub scope: Vec<String>,
    pub constraints: Vec<Constraint>,
    pub metadata: Map<String, Value>,
    pub composition: Composition,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        self.action == Action::Allowed
    }

    pub fn is_degraded(&self) -> bool {
        self.action == Action::Degraded
    }

    pub fn is_refused(&self) -> bool {
        self.action == Action::Refused
    }
}
