// operation.rs — Operations and the capability-bound operation table.
//
// An Operation is a side-effecting tool implementation (write a file, call
// an API). Every invocation takes the kernel's Capability as its first
// argument. Binding an operation wraps it in an entry that remembers the
// capability it was bound to and refuses any other one on entry, so an
// operation never runs under a capability it was not bound with.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::capability::Capability;

/// Errors an operation (or the table dispatching to it) can return.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The capability presented is not the one this table was bound to.
    #[error("missing or invalid capability")]
    CapabilityMismatch,

    /// No operation is bound under this name.
    #[error("no operation bound for tool: {tool}")]
    Unbound { tool: String },

    /// The arguments do not have the shape the operation needs.
    #[error("invalid arguments: {reason}")]
    InvalidArguments { reason: String },

    /// The operation ran and failed.
    #[error("{reason}")]
    Failed { reason: String },
}

/// A tool implementation the gate can execute.
pub trait Operation: Send + Sync {
    fn invoke(&self, cap: &Capability, args: &Value) -> Result<Value, OperationError>;
}

impl<F> Operation for F
where
    F: Fn(&Value) -> Result<Value, OperationError> + Send + Sync,
{
    fn invoke(&self, _cap: &Capability, args: &Value) -> Result<Value, OperationError> {
        self(args)
    }
}

/// An operation tied to the capability it was bound with.
struct Bound {
    owner: Uuid,
    operation: Box<dyn Operation>,
}

impl Operation for Bound {
    fn invoke(&self, cap: &Capability, args: &Value) -> Result<Value, OperationError> {
        if !cap.same_as(&self.owner) {
            tracing::warn!("operation invoked with a capability it was not bound to");
            return Err(OperationError::CapabilityMismatch);
        }
        self.operation.invoke(cap, args)
    }
}

/// Tool name → operation, bound to one capability.
pub(crate) struct OperationTable {
    owner: Uuid,
    operations: BTreeMap<String, Bound>,
}

impl OperationTable {
    pub(crate) fn new(cap: &Capability) -> Self {
        Self {
            owner: cap.id(),
            operations: BTreeMap::new(),
        }
    }

    pub(crate) fn bind(&mut self, tool: String, operation: Box<dyn Operation>) {
        let bound = Bound {
            owner: self.owner,
            operation,
        };
        self.operations.insert(tool, bound);
    }

    pub(crate) fn contains(&self, tool: &str) -> bool {
        self.operations.contains_key(tool)
    }

    pub(crate) fn tools(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub(crate) fn invoke(
        &self,
        cap: &Capability,
        tool: &str,
        args: &Value,
    ) -> Result<Value, OperationError> {
        if !cap.same_as(&self.owner) {
            return Err(OperationError::CapabilityMismatch);
        }
        let operation = self
            .operations
            .get(tool)
            .ok_or_else(|| OperationError::Unbound {
                tool: tool.to_string(),
            })?;
        operation.invoke(cap, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicUsize>);

    impl Operation for Counter {
        fn invoke(&self, _cap: &Capability, _args: &Value) -> Result<Value, OperationError> {
            Ok(json!({ "n": self.0.fetch_add(1, Ordering::SeqCst) + 1 }))
        }
    }

    #[test]
    fn bound_capability_invokes() {
        let cap = Capability::mint();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut table = OperationTable::new(&cap);
        table.bind("count".into(), Box::new(Counter(Arc::clone(&calls))));

        let out = table.invoke(&cap, "count", &json!({})).unwrap();
        assert_eq!(out["n"], 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn foreign_capability_is_rejected_before_the_operation_runs() {
        let cap = Capability::mint();
        let forged = Capability::mint();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut table = OperationTable::new(&cap);
        table.bind("count".into(), Box::new(Counter(Arc::clone(&calls))));

        let err = table.invoke(&forged, "count", &json!({})).unwrap_err();
        assert!(matches!(err, OperationError::CapabilityMismatch));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn bound_entry_checks_its_own_capability() {
        let cap = Capability::mint();
        let other = Capability::mint();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut table = OperationTable::new(&cap);
        table.bind("count".into(), Box::new(Counter(Arc::clone(&calls))));

        let entry = &table.operations["count"];
        assert!(matches!(
            entry.invoke(&other, &json!({})).unwrap_err(),
            OperationError::CapabilityMismatch
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(entry.invoke(&cap, &json!({})).unwrap()["n"], 1);
    }

    #[test]
    fn unbound_tool() {
        let cap = Capability::mint();
        let table = OperationTable::new(&cap);
        assert!(!table.contains("x"));
        assert!(matches!(
            table.invoke(&cap, "x", &Value::Null).unwrap_err(),
            OperationError::Unbound { .. }
        ));
    }

    #[test]
    fn closures_are_operations() {
        let cap = Capability::mint();
        let mut table = OperationTable::new(&cap);
        let echo = |args: &Value| -> Result<Value, OperationError> { Ok(args.clone()) };
        table.bind("echo".into(), Box::new(echo));
        assert_eq!(table.invoke(&cap, "echo", &json!([1])).unwrap(), json!([1]));
        assert_eq!(table.tools().collect::<Vec<_>>(), vec!["echo"]);
    }
}
