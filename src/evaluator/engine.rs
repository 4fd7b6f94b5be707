use crate::ast::{BinaryOperator, EvaluationTrace, Expression, UnaryOperator, Value};
use crate::error::EvaluationError;
use ahash::AHashMap;
use std::cmp::Ordering;

/// The recursive engine evaluating a parsed condition against a name-to-value context.
pub(super) struct AstEngine<'a> {
    expression: &'a Expression,
    context: &'a AHashMap<String, Value>,
}

impl<'a> AstEngine<'a> {
    pub(super) fn new(expression: &'a Expression, context: &'a AHashMap<String, Value>) -> Self {
        Self {
            expression,
            context,
        }
    }

    /// Evaluates the AST and returns a trace of the execution.
    pub(super) fn evaluate(&self) -> Result<EvaluationTrace, EvaluationError> {
        self.evaluate_recursive(self.expression)
    }

    fn evaluate_recursive(&self, expr: &Expression) -> Result<EvaluationTrace, EvaluationError> {
        match expr {
            Expression::Binary { left, op, right } => match op {
                BinaryOperator::And => self.eval_logical(left, right, *op, false),
                BinaryOperator::Or => self.eval_logical(left, right, *op, true),
                _ => self.eval_comparison(left, right, *op),
            },
            Expression::Unary {
                op: UnaryOperator::Not,
                operand,
            } => {
                let child_trace = self.evaluate_recursive(operand)?;
                let outcome = Value::Bool(!child_trace.get_outcome().is_truthy());
                Ok(EvaluationTrace::UnaryOp {
                    op_symbol: UnaryOperator::Not.symbol(),
                    child: Box::new(child_trace),
                    outcome,
                })
            }
            Expression::Variable(name) => {
                let value = self
                    .context
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvaluationError::VariableNotFound(name.clone()))?;
                Ok(EvaluationTrace::Variable {
                    name: name.clone(),
                    value,
                })
            }
            Expression::Literal(value) => Ok(EvaluationTrace::Literal {
                value: value.clone(),
            }),
        }
    }

    /// AND / OR with short-circuit: the right side is skipped once the left decides.
    fn eval_logical(
        &self,
        l: &Expression,
        r: &Expression,
        op: BinaryOperator,
        short_circuit_on: bool,
    ) -> Result<EvaluationTrace, EvaluationError> {
        let left_trace = self.evaluate_recursive(l)?;
        if left_trace.get_outcome().is_truthy() == short_circuit_on {
            return Ok(EvaluationTrace::BinaryOp {
                op_symbol: op.symbol(),
                left: Box::new(left_trace),
                right: Box::new(EvaluationTrace::NotEvaluated),
                outcome: Value::Bool(short_circuit_on),
            });
        }

        let right_trace = self.evaluate_recursive(r)?;
        let outcome = Value::Bool(right_trace.get_outcome().is_truthy());
        Ok(EvaluationTrace::BinaryOp {
            op_symbol: op.symbol(),
            left: Box::new(left_trace),
            right: Box::new(right_trace),
            outcome,
        })
    }

    fn eval_comparison(
        &self,
        l: &Expression,
        r: &Expression,
        op: BinaryOperator,
    ) -> Result<EvaluationTrace, EvaluationError> {
        let left_trace = self.evaluate_recursive(l)?;
        let right_trace = self.evaluate_recursive(r)?;
        let (lv, rv) = (left_trace.get_outcome(), right_trace.get_outcome());

        let result = match op {
            BinaryOperator::Equal => values_equal(&lv, &rv),
            BinaryOperator::NotEqual => !values_equal(&lv, &rv),
            _ => {
                let ordering = compare_values(&lv, &rv)
                    .ok_or_else(|| self.type_mismatch(op.symbol(), &lv, &rv))?;
                match op {
                    BinaryOperator::GreaterThan => ordering == Ordering::Greater,
                    BinaryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
                    BinaryOperator::LessThan => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }
            }
        };

        Ok(EvaluationTrace::BinaryOp {
            op_symbol: op.symbol(),
            left: Box::new(left_trace),
            right: Box::new(right_trace),
            outcome: Value::Bool(result),
        })
    }

    fn type_mismatch(&self, op: &str, left: &Value, right: &Value) -> EvaluationError {
        EvaluationError::TypeMismatch {
            operation: op.to_string(),
            expected: format!("a value comparable with {}", left.type_name()),
            found: right.clone(),
        }
    }
}

/// Equality across incompatible types is simply false; ints and floats compare numerically.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

/// Native ordering; `None` for pairs that have no meaningful order.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    }
}
