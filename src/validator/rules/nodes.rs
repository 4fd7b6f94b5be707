use crate::validator::{RuleContext, ValidationCode, ValidationError, ValidationMode, ValidationRule};
use crate::workflow::{Calculation, CalculationOperator, NodeDocument, OutputType, Operand};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Subprocess nodes name a sub-workflow, map known variables and write a valid identifier.
pub struct SubprocessRule;

impl ValidationRule for SubprocessRule {
    fn id(&self) -> &'static str {
        "subprocess-payload"
    }

    fn description(&self) -> &'static str {
        "Subprocess nodes need subworkflow_id, input_mapping and output_variable"
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::Strict
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for (id, type_name, node) in context.typed_nodes() {
            if type_name == "subprocess" {
                check_subprocess(context, id, node, &mut errors);
            }
        }
        errors
    }
}

fn check_subprocess(
    context: &RuleContext<'_>,
    id: &str,
    node: &NodeDocument,
    errors: &mut Vec<ValidationError>,
) {
    let name = node.display_name();
    let missing = |field: &str| {
        ValidationError::error(
            ValidationCode::InvalidSubprocess,
            format!("Subprocess '{name}' is missing required field '{field}'"),
        )
        .at_node(id)
    };

    match node
        .field_any(&["subworkflow_id", "subworkflowId"])
        .and_then(serde_json::Value::as_str)
    {
        Some(sub) if !sub.trim().is_empty() => {}
        _ => errors.push(missing("subworkflow_id")),
    }

    match node.field_any(&["input_mapping", "inputMapping"]) {
        None => errors.push(missing("input_mapping")),
        Some(serde_json::Value::Object(mapping)) => {
            for (parent, target) in mapping {
                if !target.is_string() {
                    errors.push(
                        ValidationError::error(
                            ValidationCode::InvalidInputMapping,
                            format!(
                                "Input mapping of subprocess '{name}' maps '{parent}' to a non-string value"
                            ),
                        )
                        .at_node(id),
                    );
                }
                if context.scope.find(parent).is_none() {
                    errors.push(
                        ValidationError::error(
                            ValidationCode::UnknownMappedVariable,
                            format!(
                                "Subprocess '{name}' maps unknown variable '{parent}'. Available: {}",
                                context.scope.describe()
                            ),
                        )
                        .at_node(id),
                    );
                }
            }
        }
        Some(_) => errors.push(
            ValidationError::error(
                ValidationCode::InvalidInputMapping,
                format!("Input mapping of subprocess '{name}' must be an object"),
            )
            .at_node(id),
        ),
    }

    match node
        .field_any(&["output_variable", "outputVariable"])
        .and_then(serde_json::Value::as_str)
    {
        None => errors.push(missing("output_variable")),
        Some(variable) if !IDENTIFIER.is_match(variable) => errors.push(
            ValidationError::error(
                ValidationCode::InvalidOutputVariable,
                format!(
                    "Output variable '{variable}' of subprocess '{name}' is not a valid identifier"
                ),
            )
            .at_node(id),
        ),
        Some(_) => {}
    }

    if let Some(output_type) = node
        .field_any(&["output_type", "outputType"])
        .and_then(serde_json::Value::as_str)
        .filter(|t| OutputType::parse(t).is_none())
    {
        errors.push(
            ValidationError::error(
                ValidationCode::UnknownOutputType,
                format!("Subprocess '{name}' declares unknown output type '{output_type}'"),
            )
            .at_node(id),
        );
    }
}

/// Calculation nodes carry a well-formed calculation over known variables.
pub struct CalculationRule;

impl ValidationRule for CalculationRule {
    fn id(&self) -> &'static str {
        "calculation-payload"
    }

    fn description(&self) -> &'static str {
        "Calculations need an output name, a known operator with valid arity and known operands"
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::Strict
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (id, type_name, node) in context.typed_nodes() {
            if type_name != "calculation" {
                continue;
            }
            let name = node.display_name();
            let invalid = |message: String| {
                ValidationError::error(ValidationCode::InvalidCalculation, message).at_node(id)
            };

            let Some(raw) = node.field("calculation") else {
                errors.push(invalid(format!("Calculation node '{name}' has no calculation")));
                continue;
            };
            let calculation: Calculation = match serde_json::from_value(raw.clone()) {
                Ok(calculation) => calculation,
                Err(e) => {
                    errors.push(invalid(format!("Calculation node '{name}' is malformed: {e}")));
                    continue;
                }
            };

            if calculation.derived_id().is_empty() {
                errors.push(invalid(format!(
                    "Calculation node '{name}' needs an output name containing letters or digits"
                )));
            }

            match CalculationOperator::parse(&calculation.operator) {
                None => errors.push(
                    ValidationError::error(
                        ValidationCode::UnknownOperator,
                        format!(
                            "Calculation node '{name}' uses unknown operator '{}'",
                            calculation.operator
                        ),
                    )
                    .at_node(id),
                ),
                Some(operator) => {
                    if let Err(e) = operator.check_arity(calculation.operands.len()) {
                        errors.push(invalid(format!("Calculation node '{name}': {e}")));
                    }
                }
            }

            for operand in &calculation.operands {
                match operand {
                    Operand::Variable { reference } if context.scope.find(reference).is_none() => {
                        errors.push(
                            ValidationError::error(
                                ValidationCode::UnknownOperandVariable,
                                format!(
                                    "Calculation node '{name}' references unknown variable '{reference}'. Available: {}",
                                    context.scope.describe()
                                ),
                            )
                            .at_node(id),
                        );
                    }
                    Operand::Literal { value }
                        if !value.is_number()
                            && value.as_str().is_none_or(|s| s.trim().parse::<f64>().is_err()) =>
                    {
                        errors.push(invalid(format!(
                            "Calculation node '{name}' has a non-numeric literal operand '{value}'"
                        )));
                    }
                    _ => {}
                }
            }
        }

        errors
    }
}

/// Derived variable ids must not shadow declared ones.
pub struct DerivedVariableRule;

impl ValidationRule for DerivedVariableRule {
    fn id(&self) -> &'static str {
        "derived-variables"
    }

    fn description(&self) -> &'static str {
        "Calculation and subprocess outputs must not collide with declared variables"
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::Strict
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        context
            .scope
            .derived()
            .iter()
            .filter(|derived| context.scope.declared().iter().any(|d| d.id == derived.id))
            .map(|derived| {
                ValidationError::error(
                    ValidationCode::DerivedVariableCollision,
                    format!(
                        "Derived variable '{}' collides with a declared variable of the same id",
                        derived.id
                    ),
                )
            })
            .collect()
    }
}
