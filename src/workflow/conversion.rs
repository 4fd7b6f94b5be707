use super::definition::{
    Calculation, DecisionCondition, Edge, Node, NodeKind, OutputSpec, OutputType, SubprocessCall,
    Workflow,
};
use super::document::{EdgeDocument, NodeDocument, WorkflowDocument};
use crate::error::ConversionError;
use crate::expression;
use crate::workflow::condition::Condition;
use serde::de::DeserializeOwned;

/// A trait for data models that can be converted into a typed [`Workflow`].
///
/// `WorkflowDocument` implements it for the JSON wire format. Other front ends
/// can implement it on their own structs to reuse the interpreter and the
/// source compiler.
///
/// # Example
///
/// ```rust,no_run
/// use keiro::error::ConversionError;
/// use keiro::workflow::{Edge, IntoWorkflow, Node, NodeKind, OutputSpec, Workflow};
///
/// struct Greeting {
///     text: String,
/// }
///
/// impl IntoWorkflow for Greeting {
///     fn into_workflow(self) -> Result<Workflow, ConversionError> {
///         Ok(Workflow {
///             id: "greeting".to_string(),
///             name: "Greeting".to_string(),
///             nodes: vec![
///                 Node { id: "s".into(), label: "Start".into(), x: 0.0, y: 0.0, kind: NodeKind::Start },
///                 Node {
///                     id: "e".into(),
///                     label: self.text,
///                     x: 0.0,
///                     y: 100.0,
///                     kind: NodeKind::End(OutputSpec::default()),
///                 },
///             ],
///             edges: vec![Edge { id: None, from: "s".into(), to: "e".into(), label: None }],
///             ..Workflow::default()
///         })
///     }
/// }
/// ```
pub trait IntoWorkflow {
    /// Consumes the object and converts it into a typed workflow.
    fn into_workflow(self) -> Result<Workflow, ConversionError>;
}

impl IntoWorkflow for WorkflowDocument {
    fn into_workflow(self) -> Result<Workflow, ConversionError> {
        let output_type = self
            .output_type
            .as_deref()
            .map(|name| {
                OutputType::parse(name).ok_or_else(|| ConversionError::UnknownOutputType(name.to_string()))
            })
            .transpose()?;

        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(index, node)| convert_node(index, node))
            .collect::<Result<Vec<_>, _>>()?;

        let edges = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(index, edge)| convert_edge(index, edge))
            .collect::<Result<Vec<_>, _>>()?;

        let id = self.id.unwrap_or_default();
        Ok(Workflow {
            name: self.name.unwrap_or_else(|| id.clone()),
            id,
            variables: self.variables,
            nodes,
            edges,
            output_type,
        })
    }
}

impl IntoWorkflow for &WorkflowDocument {
    fn into_workflow(self) -> Result<Workflow, ConversionError> {
        self.clone().into_workflow()
    }
}

fn convert_node(index: usize, node: NodeDocument) -> Result<Node, ConversionError> {
    let id = node
        .id
        .clone()
        .ok_or(ConversionError::MissingNodeField { index, field: "id" })?;
    let type_name = node
        .normalized_type()
        .ok_or(ConversionError::MissingNodeField { index, field: "type" })?;
    let label = node.label.clone().unwrap_or_default();

    let kind = match type_name.as_str() {
        "start" => NodeKind::Start,
        "decision" => NodeKind::Decision(decision_condition(&id, &node, &label)?),
        "calculation" => {
            let payload = node.field("calculation").cloned().ok_or_else(|| {
                ConversionError::MissingField {
                    node_id: id.clone(),
                    field: "calculation",
                }
            })?;
            NodeKind::Calculation(from_payload::<Calculation>(&id, "calculation", payload)?)
        }
        "subprocess" => {
            for field in ["subworkflow_id", "input_mapping", "output_variable"] {
                if node.field(field).is_none() && node.field(&camel_case(field)).is_none() {
                    return Err(ConversionError::MissingField {
                        node_id: id.clone(),
                        field,
                    });
                }
            }
            let payload = serde_json::Value::Object(node.data.clone());
            NodeKind::Subprocess(from_payload::<SubprocessCall>(&id, "subprocess", payload)?)
        }
        "end" => {
            let payload = serde_json::Value::Object(node.data.clone());
            NodeKind::End(from_payload::<OutputSpec>(&id, "output", payload)?)
        }
        _ => {
            return Err(ConversionError::UnknownNodeType {
                node_id: id,
                type_name,
            });
        }
    };

    Ok(Node {
        id,
        label,
        x: node.x.unwrap_or_default(),
        y: node.y.unwrap_or_default(),
        kind,
    })
}

/// Structured condition when present, else the label parsed as an expression.
fn decision_condition(
    node_id: &str,
    node: &NodeDocument,
    label: &str,
) -> Result<DecisionCondition, ConversionError> {
    if let Some(condition) = node.field("condition") {
        let condition = from_payload::<Condition>(node_id, "condition", condition.clone())?;
        return Ok(DecisionCondition::Structured(condition));
    }

    let source = label.to_string();
    Ok(match expression::parse(label) {
        Ok(expression) => DecisionCondition::Expression { source, expression },
        Err(error) => DecisionCondition::Invalid { source, error },
    })
}

fn convert_edge(index: usize, edge: EdgeDocument) -> Result<Edge, ConversionError> {
    let from = edge.from.ok_or(ConversionError::MissingEdgeEndpoint {
        index,
        field: "from",
    })?;
    let to = edge.to.ok_or(ConversionError::MissingEdgeEndpoint { index, field: "to" })?;
    Ok(Edge {
        id: edge.id,
        from,
        to,
        label: edge.label.filter(|label| !label.trim().is_empty()),
    })
}

fn from_payload<T: DeserializeOwned>(
    node_id: &str,
    field: &'static str,
    payload: serde_json::Value,
) -> Result<T, ConversionError> {
    serde_json::from_value(payload).map_err(|e| ConversionError::InvalidPayload {
        node_id: node_id.to_string(),
        field,
        message: e.to_string(),
    })
}

fn camel_case(snake: &str) -> String {
    let mut result = String::with_capacity(snake.len());
    let mut upper = false;
    for ch in snake.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            result.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            result.push(ch);
        }
    }
    result
}

