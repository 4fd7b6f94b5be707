use crate::ast::Value;
use crate::error::ExecutionError;
use crate::evaluator::parse_date;
use crate::workflow::{Variable, VariableType, Workflow};
use ahash::AHashMap;
use tracing::debug;

/// Input values keyed by variable id or display name.
pub type InputValues = AHashMap<String, Value>;

/// Checks the supplied inputs against the declared variables and returns the id-keyed context.
///
/// Variables are visited in declaration order so the first reported problem is stable.
pub(super) fn bind_inputs(
    workflow: &Workflow,
    inputs: &InputValues,
) -> Result<AHashMap<String, Value>, ExecutionError> {
    let mut context = AHashMap::new();

    for variable in &workflow.variables {
        let supplied = inputs
            .get(&variable.id)
            .or_else(|| inputs.get(&variable.name))
            .filter(|value| !value.is_null());
        if let Some(value) = supplied {
            context.insert(variable.id.clone(), check_value(variable, value)?);
        }
    }

    for key in inputs.keys() {
        if workflow.variable(key).is_none() {
            debug!(input = %key, "Ignoring input that matches no declared variable");
        }
    }

    Ok(context)
}

fn check_value(variable: &Variable, value: &Value) -> Result<Value, ExecutionError> {
    let invalid = |message: String| ExecutionError::InvalidInput {
        variable: variable.name.clone(),
        message,
    };
    let mismatch = || {
        invalid(format!(
            "expected {}, received {} '{}'",
            variable.var_type,
            value.type_name(),
            value
        ))
    };

    let checked = match (variable.var_type, value) {
        (VariableType::Int, Value::Int(_)) => value.clone(),
        (VariableType::Int, Value::Float(n)) if n.fract() == 0.0 => Value::Int(*n as i64),
        (VariableType::Float, Value::Int(n)) => Value::Float(*n as f64),
        (VariableType::Float, Value::Float(_)) => value.clone(),
        (VariableType::Bool, Value::Bool(_)) => value.clone(),
        (VariableType::String, Value::String(_)) => value.clone(),
        (VariableType::Enum, Value::String(s)) => {
            if let Some(allowed) = &variable.enum_values {
                if !allowed.iter().any(|a| a.eq_ignore_ascii_case(s)) {
                    return Err(invalid(format!(
                        "'{}' is not one of {}",
                        s,
                        allowed.join(", ")
                    )));
                }
            }
            value.clone()
        }
        (VariableType::Date, Value::String(s)) => {
            parse_date(s).map_err(|e| invalid(e.to_string()))?;
            value.clone()
        }
        _ => return Err(mismatch()),
    };

    if let (Some(range), Some(n)) = (&variable.range, checked.as_f64()) {
        if !range.contains(n) {
            let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_else(|| "∞".to_string());
            return Err(invalid(format!(
                "{} is outside the allowed range [{}, {}]",
                checked,
                bound(range.min),
                bound(range.max)
            )));
        }
    }

    Ok(checked)
}
