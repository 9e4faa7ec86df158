// engine.rs — Policy evaluation engine.
//
// The PolicyEngine owns the rule table and runs every canonical evaluator
// against a request, then composes the results with AND:
//
// 1. Domain on the deny-list?              → refused (refuse_domain)
// 2. Tool missing from the allow-list?     → refused (unauthorized_tool)
// 3. Action requires confirmation?         → degraded until confirmed
// 4. Otherwise                             → allowed
//
// All evaluators always run (no short-circuit) so the verdict carries the
// full scope and constraint set. The engine is pure: same table, same input,
// same verdict.

use serde::{Deserialize, Serialize};

use crate::compose::compose_and;
use crate::evaluators::{RuleInput, CANONICAL_EVALUATORS};
use crate::result::{ElementaryResult, Verdict};
use crate::rules::RuleTable;

/// One evaluator's contribution to a decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationStep {
    /// Which evaluator produced this result.
    pub rule: String,
    pub result: ElementaryResult,
}

/// Full evaluation trace returned alongside a verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationTrace {
    pub verdict: Verdict,
    /// Evaluator results, in composition order.
    pub steps: Vec<EvaluationStep>,
}

/// The policy engine — evaluates requests against the rule table.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    table: RuleTable,
}

impl PolicyEngine {
    pub fn new(table: RuleTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// The rule table version, recorded in receipts.
    pub fn version(&self) -> &str {
        &self.table.version
    }

    /// Run every evaluator and return their raw results, in order.
    pub fn results(&self, input: &RuleInput<'_>) -> Vec<ElementaryResult> {
        CANONICAL_EVALUATORS
            .iter()
            .map(|(_, evaluate)| evaluate(&self.table, input))
            .collect()
    }

    /// Evaluate a request and return the AND-composed verdict.
    pub fn evaluate(&self, input: &RuleInput<'_>) -> Verdict {
        compose_and(&self.results(input))
    }

    /// Evaluate a request and return the verdict with every evaluator's result.
    pub fn evaluate_with_trace(&self, input: &RuleInput<'_>) -> EvaluationTrace {
        let steps: Vec<EvaluationStep> = CANONICAL_EVALUATORS
            .iter()
            .map(|(rule, evaluate)| EvaluationStep {
                rule: (*rule).to_string(),
                result: evaluate(&self.table, input),
            })
            .collect();
        let results: Vec<ElementaryResult> = steps.iter().map(|s| s.result.clone()).collect();
        EvaluationTrace {
            verdict: compose_and(&results),
            steps,
        }
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(RuleTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Action, Composition};

    fn engine() -> PolicyEngine {
        PolicyEngine::new(
            RuleTable::default()
                .with_allowed_tools(["allowed.write"])
                .with_refuse_domains(["fraud"])
                .with_confirm_required_actions(["write"]),
        )
    }

    #[test]
    fn fraud_domain_is_refused_regardless_of_tool() {
        // Tool "x" is not allow-listed either; the domain rule runs first
        // so its reason wins the tie.
        let v = engine().evaluate(&RuleInput::new("x", "read", "fraud"));
        assert_eq!(v.action, Action::Refused);
        assert_eq!(v.reason, "refuse_domain");

        let v = engine().evaluate(&RuleInput::new("allowed.write", "read", "fraud"));
        assert_eq!(v.reason, "refuse_domain");
    }

    #[test]
    fn unconfirmed_write_is_degraded() {
        let v = engine().evaluate(&RuleInput::new("allowed.write", "write", "general"));
        assert_eq!(v.action, Action::Degraded);
        assert_eq!(v.reason, "confirmation_required");
        assert_eq!(v.composition, Composition::And);
    }

    #[test]
    fn confirmed_write_is_allowed() {
        let input = RuleInput::new("allowed.write", "write", "general").confirmed(true);
        let v = engine().evaluate(&input);
        assert_eq!(v.action, Action::Allowed);
        assert_eq!(v.reason, "domain_ok");
    }

    #[test]
    fn unknown_tool_is_refused() {
        let v = engine().evaluate(&RuleInput::new("filesystem.deleteFile", "delete", "general"));
        assert_eq!(v.action, Action::Refused);
        assert_eq!(v.reason, "unauthorized_tool");
        assert!(v.scope.contains(&"tool".to_string()));
    }

    #[test]
    fn trace_records_every_evaluator() {
        let trace =
            engine().evaluate_with_trace(&RuleInput::new("allowed.write", "write", "general"));
        let rules: Vec<&str> = trace.steps.iter().map(|s| s.rule.as_str()).collect();
        assert_eq!(
            rules,
            vec!["refuse_domain", "allowed_tools", "confirm_required_actions"]
        );
        assert_eq!(trace.verdict, engine().evaluate(&RuleInput::new("allowed.write", "write", "general")));
    }

    #[test]
    fn version_comes_from_table() {
        assert_eq!(engine().version(), "v2");
    }
}
