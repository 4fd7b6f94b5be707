use crate::ast::{EvaluationTrace, LiteralDisplay};

/// Formats evaluation traces into human-readable decision reasons.
pub struct TraceFormatter;

impl TraceFormatter {
    /// Format an evaluation trace into an explanation such as `Age (was 20) >= 18`.
    pub fn format_trace(trace: &EvaluationTrace) -> String {
        Self::format_recursive(trace, 0)
    }

    /// Recursively formats the trace, adding parentheses only when necessary.
    fn format_recursive(trace: &EvaluationTrace, parent_precedence: u8) -> String {
        let current_precedence = trace.precedence();
        let needs_parens = current_precedence < parent_precedence;

        let mut result = String::new();
        if needs_parens {
            result.push('(');
        }

        match trace {
            EvaluationTrace::BinaryOp {
                op_symbol,
                left,
                right,
                ..
            } => {
                let left_str = Self::format_recursive(left, current_precedence);

                // Short-circuited operators only show the side that decided the outcome.
                if matches!(**right, EvaluationTrace::NotEvaluated) {
                    result.push_str(&left_str);
                } else {
                    let right_str = Self::format_recursive(right, current_precedence + 1);
                    result.push_str(&format!("{} {} {}", left_str, op_symbol, right_str));
                }
            }
            EvaluationTrace::UnaryOp {
                op_symbol, child, ..
            } => {
                let child_str = Self::format_recursive(child, current_precedence);
                result.push_str(&format!("{} {}", op_symbol, child_str));
            }
            EvaluationTrace::Variable { name, value } => {
                result.push_str(&format!("{} (was {})", name, LiteralDisplay(value)));
            }
            EvaluationTrace::Literal { value } => {
                result.push_str(&LiteralDisplay(value).to_string());
            }
            EvaluationTrace::NotEvaluated => {}
        }

        if needs_parens {
            result.push(')');
        }
        result
    }
}
