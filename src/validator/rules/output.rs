use crate::validator::{RuleContext, ValidationCode, ValidationError, ValidationMode, ValidationRule};
use crate::workflow::{NodeDocument, OutputType, template};
use itertools::Itertools;

/// `{Var}` placeholders in end node outputs reference known variables.
pub struct OutputTemplateRule;

impl ValidationRule for OutputTemplateRule {
    fn id(&self) -> &'static str {
        "output-template"
    }

    fn description(&self) -> &'static str {
        "Output templates may only interpolate declared or derived variables"
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::Strict
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (id, type_name, node) in context.typed_nodes() {
            if type_name != "end" {
                continue;
            }
            let Some(text) = output_text(node) else {
                continue;
            };
            for name in template::placeholders(text).into_iter().unique() {
                if context.scope.find(name).is_none() {
                    errors.push(
                        ValidationError::error(
                            ValidationCode::UndeclaredTemplateVariable,
                            format!(
                                "Output of '{}' references undeclared variable '{{{name}}}'. Valid names: {}",
                                node.display_name(),
                                context.scope.describe()
                            ),
                        )
                        .at_node(id),
                    );
                }
            }
        }

        errors
    }
}

/// The template when set, else the label when no literal output value is set.
fn output_text(node: &NodeDocument) -> Option<&str> {
    let template = node
        .field_any(&["output_template", "outputTemplate", "template"])
        .and_then(serde_json::Value::as_str)
        .filter(|t| !t.trim().is_empty());
    match template {
        Some(template) => Some(template),
        None if node.field_any(&["output_value", "outputValue"]).is_some() => None,
        None => node.label.as_deref(),
    }
}

/// Output types are known, and agree with the workflow's declared output type.
pub struct OutputTypeRule;

impl ValidationRule for OutputTypeRule {
    fn id(&self) -> &'static str {
        "output-type"
    }

    fn description(&self) -> &'static str {
        "End nodes must produce the workflow's declared output type"
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::Strict
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let declared = match context.document.output_type.as_deref() {
            Some(name) => match OutputType::parse(name) {
                Some(output_type) => Some(output_type),
                None => {
                    errors.push(ValidationError::error(
                        ValidationCode::UnknownOutputType,
                        format!("Workflow declares unknown output type '{name}'"),
                    ));
                    None
                }
            },
            None => None,
        };

        for (id, type_name, node) in context.typed_nodes() {
            if type_name != "end" {
                continue;
            }
            let name = node.display_name();
            let output_type = match node
                .field_any(&["output_type", "outputType"])
                .and_then(serde_json::Value::as_str)
            {
                None => OutputType::default(),
                Some(raw) => match OutputType::parse(raw) {
                    Some(output_type) => output_type,
                    None => {
                        errors.push(
                            ValidationError::error(
                                ValidationCode::UnknownOutputType,
                                format!("End node '{name}' declares unknown output type '{raw}'"),
                            )
                            .at_node(id),
                        );
                        continue;
                    }
                },
            };

            if let Some(declared) = declared.filter(|declared| *declared != output_type) {
                errors.push(
                    ValidationError::error(
                        ValidationCode::OutputTypeMismatch,
                        format!(
                            "End node '{name}' produces {output_type} but the workflow declares {declared}"
                        ),
                    )
                    .at_node(id),
                );
            }
        }

        errors
    }
}
