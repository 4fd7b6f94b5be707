//! The two condition evaluation strategies.
//!
//! Structured conditions are type-checked against a comparator family and read
//! the id-keyed context. Free-text conditions are parsed into an
//! [`Expression`] and evaluated against a name-keyed context, producing an
//! [`EvaluationTrace`] that explains the outcome.

use crate::ast::{EvaluationTrace, Expression, Value};
use crate::error::EvaluationError;
use ahash::AHashMap;

mod condition;
mod engine;

pub use condition::{evaluate_condition, parse_date};

use engine::AstEngine;

/// Evaluates an expression and returns the full trace.
///
/// The outcome is `trace.get_outcome().is_truthy()`.
pub fn trace_expression(
    expression: &Expression,
    context: &AHashMap<String, Value>,
) -> Result<EvaluationTrace, EvaluationError> {
    AstEngine::new(expression, context).evaluate()
}

/// Evaluates an expression to a boolean by truthiness.
pub fn evaluate_expression(
    expression: &Expression,
    context: &AHashMap<String, Value>,
) -> Result<bool, EvaluationError> {
    trace_expression(expression, context).map(|trace| trace.get_outcome().is_truthy())
}
