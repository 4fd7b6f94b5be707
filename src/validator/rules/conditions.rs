use crate::expression;
use crate::validator::{RuleContext, ValidationCode, ValidationError, ValidationMode, ValidationRule};
use crate::workflow::{Comparator, ComparatorFamily, Condition, NodeDocument};
use std::collections::HashSet;

/// Decision nodes carry a usable condition over known variables.
///
/// A structured `condition` is checked against the variable's type. Without
/// one, the label is parsed as an expression and its names must resolve.
pub struct DecisionConditionRule;

impl ValidationRule for DecisionConditionRule {
    fn id(&self) -> &'static str {
        "decision-conditions"
    }

    fn description(&self) -> &'static str {
        "Decisions need a valid condition that references known variables"
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::Strict
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for (id, type_name, node) in context.typed_nodes() {
            if type_name != "decision" {
                continue;
            }
            if let Some(raw) = node.field("condition") {
                check_structured(context, id, node, raw, &mut errors);
            } else if let Some(label) = node.label.as_deref().filter(|l| !l.trim().is_empty()) {
                check_label(context, id, label, &mut errors);
            } else {
                errors.push(
                    ValidationError::error(
                        ValidationCode::MissingCondition,
                        format!("Decision '{}' has neither a condition nor a label", node.display_name()),
                    )
                    .at_node(id),
                );
            }
        }
        errors
    }
}

fn check_structured(
    context: &RuleContext<'_>,
    id: &str,
    node: &NodeDocument,
    raw: &serde_json::Value,
    errors: &mut Vec<ValidationError>,
) {
    let name = node.display_name();
    let condition: Condition = match serde_json::from_value(raw.clone()) {
        Ok(condition) => condition,
        Err(e) => {
            errors.push(
                ValidationError::error(
                    ValidationCode::InvalidCondition,
                    format!("Decision '{name}' has a malformed condition: {e}"),
                )
                .at_node(id),
            );
            return;
        }
    };

    let Some(variable) = context.scope.find_id(&condition.input_id) else {
        errors.push(
            ValidationError::error(
                ValidationCode::UnknownConditionVariable,
                format!(
                    "Decision '{name}' references unknown variable '{}'. Available: {}",
                    condition.input_id,
                    context.scope.describe()
                ),
            )
            .at_node(id),
        );
        return;
    };

    let Some(comparator) = Comparator::parse(&condition.comparator) else {
        errors.push(
            ValidationError::error(
                ValidationCode::UnknownComparator,
                format!("Decision '{name}' uses unknown comparator '{}'", condition.comparator),
            )
            .at_node(id),
        );
        return;
    };

    if let Some(var_type) = variable.var_type {
        let family = ComparatorFamily::for_type(var_type);
        if comparator.family() != family {
            let allowed: Vec<&str> = family.comparators().iter().map(|c| c.as_str()).collect();
            errors.push(
                ValidationError::error(
                    ValidationCode::InvalidComparator,
                    format!(
                        "Comparator '{comparator}' cannot be used with {var_type} variable '{}'. Valid comparators: {}",
                        variable.name,
                        allowed.join(", ")
                    ),
                )
                .at_node(id),
            );
        }
    }

    if comparator.needs_second_value() && condition.value2.as_ref().is_none_or(|v| v.is_null()) {
        errors.push(
            ValidationError::error(
                ValidationCode::InvalidCondition,
                format!("Comparator '{comparator}' in decision '{name}' requires a second value"),
            )
            .at_node(id),
        );
    }
}

fn check_label(
    context: &RuleContext<'_>,
    id: &str,
    label: &str,
    errors: &mut Vec<ValidationError>,
) {
    let expression = match expression::parse(label) {
        Ok(expression) => expression,
        Err(e) => {
            errors.push(
                ValidationError::error(
                    ValidationCode::InvalidConditionSyntax,
                    format!("Condition '{label}' could not be parsed: {e}"),
                )
                .at_node(id),
            );
            return;
        }
    };

    let mut names = HashSet::new();
    expression.referenced_variables(&mut names);
    let mut names: Vec<String> = names.into_iter().collect();
    names.sort();

    for variable in names {
        if context.scope.is_empty() {
            errors.push(
                ValidationError::error(
                    ValidationCode::UnknownConditionVariable,
                    format!("Condition '{label}' references '{variable}' but the workflow declares no variables"),
                )
                .at_node(id),
            );
        } else if context.scope.find_named(&variable).is_none() {
            errors.push(
                ValidationError::error(
                    ValidationCode::UnknownConditionVariable,
                    format!(
                        "Condition '{label}' references unknown variable '{variable}'. Available: {}",
                        context.scope.describe()
                    ),
                )
                .at_node(id),
            );
        }
    }
}
