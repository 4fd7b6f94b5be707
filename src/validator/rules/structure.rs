use crate::validator::{RuleContext, ValidationCode, ValidationError, ValidationRule};
use crate::workflow::NODE_TYPES;
use ahash::AHashSet;
use itertools::Itertools;

/// Every node carries `id, type, label, x, y` and a known type.
pub struct RequiredFieldsRule;

impl ValidationRule for RequiredFieldsRule {
    fn id(&self) -> &'static str {
        "required-fields"
    }

    fn description(&self) -> &'static str {
        "Nodes must carry id, type, label and coordinates, and use a known type"
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (index, node) in context.document.nodes.iter().enumerate() {
            let present = [
                ("id", node.id.is_some()),
                ("type", node.node_type.is_some()),
                ("label", node.label.is_some()),
                ("x", node.x.is_some()),
                ("y", node.y.is_some()),
            ];
            for (field, _) in present.iter().filter(|(_, found)| !found) {
                let error = ValidationError::error(
                    ValidationCode::MissingRequiredField,
                    format!("Node at index {index} is missing required field '{field}'"),
                );
                errors.push(match &node.id {
                    Some(id) => error.at_node(id),
                    None => error,
                });
            }

            if let Some(type_name) = node
                .normalized_type()
                .filter(|t| !NODE_TYPES.contains(&t.as_str()))
            {
                let error = ValidationError::error(
                    ValidationCode::UnknownNodeType,
                    format!(
                        "Node '{}' has unknown type '{}'. Expected one of: {}",
                        node.display_name(),
                        type_name,
                        NODE_TYPES.join(", ")
                    ),
                );
                errors.push(match &node.id {
                    Some(id) => error.at_node(id),
                    None => error,
                });
            }
        }

        errors
    }
}

/// Node, edge and variable ids are unique within their kind.
pub struct DuplicateIdRule;

impl ValidationRule for DuplicateIdRule {
    fn id(&self) -> &'static str {
        "duplicate-ids"
    }

    fn description(&self) -> &'static str {
        "Node, edge and variable ids must be unique"
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let document = context.document;
        let mut errors = Vec::new();

        for id in duplicates(document.nodes.iter().filter_map(|n| n.id.as_deref())) {
            errors.push(
                ValidationError::error(
                    ValidationCode::DuplicateNodeId,
                    format!("Duplicate node id '{id}'"),
                )
                .at_node(id),
            );
        }
        for id in duplicates(document.edges.iter().filter_map(|e| e.id.as_deref())) {
            errors.push(
                ValidationError::error(
                    ValidationCode::DuplicateEdgeId,
                    format!("Duplicate edge id '{id}'"),
                )
                .at_edge(Some(id)),
            );
        }
        for id in duplicates(document.variables.iter().map(|v| v.id.as_str())) {
            errors.push(ValidationError::error(
                ValidationCode::DuplicateVariableId,
                format!("Duplicate variable id '{id}'"),
            ));
        }

        errors
    }
}

/// Ids seen more than once, each reported once, in first-repeat order.
fn duplicates<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = AHashSet::new();
    let mut reported = AHashSet::new();
    ids.filter(|id| !seen.insert(*id) && reported.insert(*id))
        .collect()
}

/// Edges have both endpoints and both name existing nodes.
pub struct EdgeReferenceRule;

impl ValidationRule for EdgeReferenceRule {
    fn id(&self) -> &'static str {
        "edge-references"
    }

    fn description(&self) -> &'static str {
        "Edges must connect existing nodes"
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (index, edge) in context.document.edges.iter().enumerate() {
            let edge_name = edge.id.clone().unwrap_or_else(|| format!("#{index}"));
            for (field, endpoint) in [("from", &edge.from), ("to", &edge.to)] {
                match endpoint {
                    None => errors.push(
                        ValidationError::error(
                            ValidationCode::MissingRequiredField,
                            format!("Edge {edge_name} is missing required field '{field}'"),
                        )
                        .at_edge(edge.id.as_deref()),
                    ),
                    Some(target) if !context.has_node(target) => errors.push(
                        ValidationError::error(
                            ValidationCode::InvalidEdgeReference,
                            format!(
                                "Edge {edge_name} references non-existent node '{target}' in '{field}'"
                            ),
                        )
                        .at_edge(edge.id.as_deref()),
                    ),
                    Some(_) => {}
                }
            }
        }

        errors
    }
}

/// At most one start node; in strict mode, exactly one when the workflow has nodes.
pub struct StartNodeRule;

impl ValidationRule for StartNodeRule {
    fn id(&self) -> &'static str {
        "start-node"
    }

    fn description(&self) -> &'static str {
        "A workflow has a single start node"
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let starts: Vec<_> = context
            .document
            .nodes
            .iter()
            .filter(|node| node.is_type("start"))
            .collect();

        match starts.as_slice() {
            [] if context.is_strict() && !context.document.nodes.is_empty() => {
                vec![ValidationError::error(
                    ValidationCode::MissingStartNode,
                    "Workflow has no start node",
                )]
            }
            [] | [_] => Vec::new(),
            [first, ..] => {
                let labels = starts.iter().map(|node| node.display_name()).join(", ");
                let error = ValidationError::error(
                    ValidationCode::MultipleStartNodes,
                    format!(
                        "Workflow has {} start nodes ({labels}); exactly one is allowed",
                        starts.len()
                    ),
                );
                vec![match &first.id {
                    Some(id) => error.at_node(id),
                    None => error,
                }]
            }
        }
    }
}
