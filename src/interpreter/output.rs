use super::scope::Scope;
use crate::ast::Value;
use crate::error::ExecutionError;
use crate::workflow::template;
use crate::workflow::{Node, OutputSpec, OutputType};
use ahash::AHashMap;
use tracing::warn;

/// Produces the value of an end node.
///
/// Precedence is template, then `output_value`, then the label. For typed
/// outputs a template that is a single placeholder yields the raw value.
pub(super) fn resolve_output(
    node: &Node,
    spec: &OutputSpec,
    scope: &Scope<'_>,
    context: &AHashMap<String, Value>,
    warnings: &mut Vec<String>,
) -> Result<Value, ExecutionError> {
    let coerce = |value: Value| {
        spec.output_type
            .coerce(value)
            .map_err(|source| ExecutionError::OutputCoercion {
                node_id: node.id.clone(),
                source,
            })
    };

    let template_text = match (spec.template(), &spec.output_value) {
        (Some(template), _) => template,
        (None, Some(value)) => return coerce(value.clone()),
        (None, None) => node.label.as_str(),
    };

    if spec.output_type != OutputType::String {
        if let Some(value) = template::single_placeholder(template_text)
            .and_then(|name| scope.lookup(context, name))
        {
            return coerce(value.clone());
        }
    }

    for name in template::placeholders(template_text) {
        if scope.lookup(context, name).is_none() {
            let message = format!(
                "Output of node '{}' references '{}', which has no value; the placeholder was kept",
                node.id, name
            );
            warn!(node_id = %node.id, placeholder = %name, "Unresolved output placeholder");
            warnings.push(message);
        }
    }

    let rendered = template::render(template_text, |name| {
        scope.lookup(context, name).map(|value| value.to_string())
    });
    coerce(Value::String(rendered))
}
