// evaluators.rs — The canonical rule evaluators.
//
// Each evaluator is a pure function of (rule table, input) that returns
// exactly one ElementaryResult. Missing fields (empty strings) always
// produce a refusal. Evaluators never see the confirmation token itself,
// only whether the kernel already redeemed one for this request.

use crate::result::{Constraint, ElementaryResult};
use crate::rules::RuleTable;

/// The view of a request that rule evaluators get to see.
///
/// Free-text fields, arguments and tokens are deliberately absent: nothing
/// an agent writes about its intent can influence a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleInput<'a> {
    pub tool: &'a str,
    pub action: &'a str,
    pub domain: &'a str,
    /// True once the kernel has redeemed a confirmation token for this exact call.
    pub confirmed: bool,
}

impl<'a> RuleInput<'a> {
    pub fn new(tool: &'a str, action: &'a str, domain: &'a str) -> Self {
        Self {
            tool,
            action,
            domain,
            confirmed: false,
        }
    }

    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = confirmed;
        self
    }
}

/// Signature shared by all evaluators.
pub type Evaluator = fn(&RuleTable, &RuleInput<'_>) -> ElementaryResult;

/// The evaluators in the order their results are composed.
pub const CANONICAL_EVALUATORS: &[(&str, Evaluator)] = &[
    ("refuse_domain", refuse_domain),
    ("allowed_tools", allowed_tools),
    ("confirm_required_actions", confirm_required_actions),
];

/// Refuse any request whose domain is on the deny-list.
pub fn refuse_domain(table: &RuleTable, input: &RuleInput<'_>) -> ElementaryResult {
    let domain = input.domain.trim();
    if domain.is_empty() {
        return ElementaryResult::refused("missing_domain").with_scope("domain");
    }
    if table.refuse_domains.contains(domain) {
        return ElementaryResult::refused("refuse_domain").with_scope("domain");
    }
    ElementaryResult::allowed("domain_ok")
}

/// Refuse any tool not on the allow-list.
///
/// The allow-list is attached as a constraint whatever the outcome, so a
/// refused caller can see what it is permitted to use.
pub fn allowed_tools(table: &RuleTable, input: &RuleInput<'_>) -> ElementaryResult {
    let Some(allowed) = &table.allowed_tools else {
        return ElementaryResult::allowed("no_tool_allowlist");
    };

    let constraint = Constraint::AllowedTools {
        tools: allowed.iter().cloned().collect(),
    };

    let tool = input.tool.trim();
    if tool.is_empty() || !allowed.contains(tool) {
        return ElementaryResult::refused("unauthorized_tool")
            .with_scope("tool")
            .with_constraint(constraint);
    }

    ElementaryResult::allowed("tool_allowed").with_constraint(constraint)
}

/// Degrade high-impact actions until a confirmation has been redeemed.
pub fn confirm_required_actions(table: &RuleTable, input: &RuleInput<'_>) -> ElementaryResult {
    let action = input.action.trim();
    if action.is_empty() {
        return ElementaryResult::refused("missing_action").with_scope("action");
    }
    if !table.confirm_required_actions.contains(action) {
        return ElementaryResult::allowed("rule_passed");
    }
    if input.confirmed {
        ElementaryResult::allowed("confirmation_redeemed").with_scope("action")
    } else {
        ElementaryResult::degraded("confirmation_required").with_scope("action")
    }
}
