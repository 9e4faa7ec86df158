// compose.rs — Merge elementary results into one verdict.
//
// AND: the worst action wins; the reason comes from the first input that
// carries the worst action. OR: any allowed input makes the verdict allowed;
// otherwise it falls back to AND. In both modes scopes are unioned and
// constraints are concatenated in input order.
//
// An empty input set is refused with "no_rules" in both modes.

use serde_json::Map;

use crate::result::{Action, Composition, ElementaryResult, Verdict};

/// Reason used when there is nothing to compose.
pub const NO_RULES: &str = "no_rules";

/// Compose results with AND semantics (priority: refused > degraded > allowed).
pub fn compose_and(results: &[ElementaryResult]) -> Verdict {
    let Some(first) = results.first() else {
        return empty(Composition::And);
    };

    // Strict `>` keeps the first occurrence among equally severe inputs.
    let mut worst = first;
    for result in results {
        if result.action > worst.action {
            worst = result;
        }
    }

    Verdict {
        action: worst.action,
        reason: worst.reason.clone(),
        scope: union_scope(results),
        constraints: results
            .iter()
            .flat_map(|r| r.constraints.iter().cloned())
            .collect(),
        metadata: worst.metadata.clone(),
        composition: Composition::And,
    }
}

/// Compose results with OR semantics.
///
/// Scope and constraints are aggregated over *all* inputs even when one
/// allowed input decides the verdict.
pub fn compose_or(results: &[ElementaryResult]) -> Verdict {
    if results.is_empty() {
        return empty(Composition::Or);
    }

    match results.iter().find(|r| r.action == Action::Allowed) {
        Some(first_allowed) => Verdict {
            action: Action::Allowed,
            reason: first_allowed.reason.clone(),
            scope: union_scope(results),
            constraints: results
                .iter()
                .flat_map(|r| r.constraints.iter().cloned())
                .collect(),
            metadata: first_allowed.metadata.clone(),
            composition: Composition::Or,
        },
        None => Verdict {
            composition: Composition::Or,
            ..compose_and(results)
        },
    }
}

fn empty(composition: Composition) -> Verdict {
    Verdict {
        action: Action::Refused,
        reason: NO_RULES.to_string(),
        scope: Vec::new(),
        constraints: Vec::new(),
        metadata: Map::new(),
        composition,
    }
}

/// Union of scope tags, in first-seen order.
fn union_scope(results: &[ElementaryResult]) -> Vec<String> {
    let mut scope: Vec<String> = Vec::new();
    for tag in results.iter().flat_map(|r| r.scope.iter()) {
        if !scope.contains(tag) {
            scope.push(tag.clone());
        }
    }
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Constraint;

    fn shape(msg: &str) -> Constraint {
        Constraint::Shape {
            message: msg.to_string(),
        }
    }

    #[test]
    fn and_of_nothing_is_refused() {
        let v = compose_and(&[]);
        assert_eq!(v.action, Action::Refused);
        assert_eq!(v.reason, "no_rules");
        assert_eq!(v.composition, Composition::And);
    }

    #[test]
    fn or_of_nothing_is_refused() {
        let v = compose_or(&[]);
        assert_eq!(v.action, Action::Refused);
        assert_eq!(v.reason, "no_rules");
        assert_eq!(v.composition, Composition::Or);
    }

    #[test]
    fn and_of_all_allowed_is_allowed_with_first_reason() {
        let v = compose_and(&[
            ElementaryResult::allowed("domain_ok"),
            ElementaryResult::allowed("tool_allowed"),
        ]);
        assert_eq!(v.action, Action::Allowed);
        assert_eq!(v.reason, "domain_ok");
    }

    #[test]
    fn and_any_refused_is_refused() {
        let v = compose_and(&[
            ElementaryResult::allowed("a"),
            ElementaryResult::degraded("b"),
            ElementaryResult::refused("c"),
            ElementaryResult::allowed("d"),
        ]);
        assert_eq!(v.action, Action::Refused);
        assert_eq!(v.reason, "c");
    }

    #[test]
    fn and_tie_keeps_first_reason() {
        let v = compose_and(&[
            ElementaryResult::allowed("a"),
            ElementaryResult::refused("first").with_metadata("n", 1.into()),
            ElementaryResult::refused("second").with_metadata("n", 2.into()),
        ]);
        assert_eq!(v.reason, "first");
        assert_eq!(v.metadata["n"], 1);
    }

    #[test]
    fn and_degraded_beats_allowed() {
        let v = compose_and(&[
            ElementaryResult::allowed("a"),
            ElementaryResult::degraded("confirmation_required"),
        ]);
        assert_eq!(v.action, Action::Degraded);
        assert_eq!(v.reason, "confirmation_required");
    }

    #[test]
    fn scope_is_unioned_and_constraints_concatenated_in_order() {
        let v = compose_and(&[
            ElementaryResult::allowed("a")
                .with_scope("tool")
                .with_constraint(shape("one")),
            ElementaryResult::refused("b")
                .with_scope("domain")
                .with_scope("tool")
                .with_constraint(shape("two")),
            ElementaryResult::allowed("c").with_constraint(shape("three")),
        ]);
        assert_eq!(v.scope, vec!["tool".to_string(), "domain".to_string()]);
        assert_eq!(
            v.constraints,
            vec![shape("one"), shape("two"), shape("three")]
        );
    }

    #[test]
    fn or_any_allowed_is_allowed_but_aggregates_everything() {
        let v = compose_or(&[
            ElementaryResult::refused("no").with_scope("domain"),
            ElementaryResult::allowed("yes").with_constraint(shape("kept")),
            ElementaryResult::allowed("also"),
        ]);
        assert_eq!(v.action, Action::Allowed);
        assert_eq!(v.reason, "yes");
        assert_eq!(v.scope, vec!["domain".to_string()]);
        assert_eq!(v.constraints, vec![shape("kept")]);
        assert_eq!(v.composition, Composition::Or);
    }

    #[test]
    fn or_without_allowed_falls_back_to_and() {
        let v = compose_or(&[
            ElementaryResult::degraded("d"),
            ElementaryResult::refused("r"),
        ]);
        assert_eq!(v.action, Action::Refused);
        assert_eq!(v.reason, "r");
        assert_eq!(v.composition, Composition::Or);
    }
}
