//! # tg-policy
//!
//! Rule evaluation and decision composition for Tool Gate.
//!
//! Every tool call request is run through a fixed set of rule evaluators.
//! Each evaluator returns one [`ElementaryResult`]; the composer merges them
//! into a single [`Verdict`] that says whether the call is allowed, degraded
//! (needs explicit confirmation), or refused.
//!
//! ## Key invariants
//!
//! - **Fail closed**: no rules → refused. Missing request fields → refused.
//! - **Severity never downgrades**: refused > degraded > allowed, and AND
//!   composition always keeps the worst.
//! - **Pure**: evaluators and composers never touch storage and never fail.

pub mod compose;
pub mod engine;
pub mod error;
pub mod evaluators;
pub mod result;
pub mod rules;

pub use compose::{compose_and, compose_or};
pub use engine::{EvaluationTrace, PolicyEngine};
pub use error::PolicyError;
pub use evaluators::RuleInput;
pub use result::{Action, Composition, Constraint, ElementaryResult, Verdict};
pub use rules::RuleTable;
