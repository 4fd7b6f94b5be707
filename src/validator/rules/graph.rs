use crate::error::BranchError;
use crate::validator::{RuleContext, ValidationCode, ValidationError, ValidationMode, ValidationRule};
use crate::workflow::{BranchLabel, DecisionBranches, SuccessorIndex, resolve_branches};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use std::collections::{BTreeSet, VecDeque};

/// No edge may point back at its own source.
pub struct SelfLoopRule;

impl ValidationRule for SelfLoopRule {
    fn id(&self) -> &'static str {
        "self-loop"
    }

    fn description(&self) -> &'static str {
        "Edges must not connect a node to itself"
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        context
            .document
            .edges
            .iter()
            .filter_map(|edge| {
                let from = edge.from.as_deref()?;
                (Some(from) == edge.to.as_deref()).then(|| {
                    let name = context.document.node(from).map_or(from, |n| n.display_name());
                    ValidationError::error(
                        ValidationCode::SelfLoopDetected,
                        format!("Node '{name}' has an edge to itself"),
                    )
                    .at_node(from)
                    .at_edge(edge.id.as_deref())
                })
            })
            .collect()
    }
}

/// The graph must be acyclic. Self-loops are reported by [`SelfLoopRule`] instead.
pub struct CycleRule;

impl ValidationRule for CycleRule {
    fn id(&self) -> &'static str {
        "cycle-detection"
    }

    fn description(&self) -> &'static str {
        "Workflows must not contain cycles"
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let mut search = CycleSearch {
            successors: &context.successors,
            colour: AHashMap::new(),
            parent: AHashMap::new(),
        };

        for node in context.document.nodes.iter().filter_map(|n| n.id.as_deref()) {
            if search.colour.contains_key(node) {
                continue;
            }
            if let Some(cycle) = search.visit(node) {
                return vec![
                    ValidationError::error(
                        ValidationCode::CycleDetected,
                        format!("Cycle detected: {}", cycle.iter().join(" → ")),
                    )
                    .at_node(cycle[0]),
                ];
            }
        }
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    Grey,
    Black,
}

/// Three-colour depth-first search. Nodes missing from `colour` are white.
///
/// Runs on an explicit stack so long chains cannot exhaust the call stack.
struct CycleSearch<'i, 'a> {
    successors: &'i SuccessorIndex<'a>,
    colour: AHashMap<&'a str, Colour>,
    parent: AHashMap<&'a str, &'a str>,
}

impl<'a> CycleSearch<'_, 'a> {
    fn visit(&mut self, root: &'a str) -> Option<Vec<&'a str>> {
        let successors = self.successors;
        self.colour.insert(root, Colour::Grey);
        // Each frame is a grey node and the position of its next successor.
        let mut stack: Vec<(&'a str, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, position) = *frame;
            let Some(successor) = successors.of(node).get(position) else {
                self.colour.insert(node, Colour::Black);
                stack.pop();
                continue;
            };
            frame.1 += 1;

            let target = successor.target;
            if target == node {
                continue;
            }
            match self.colour.get(target) {
                Some(Colour::Black) => {}
                Some(Colour::Grey) => return Some(self.reconstruct(node, target)),
                None => {
                    self.parent.insert(target, node);
                    self.colour.insert(target, Colour::Grey);
                    stack.push((target, 0));
                }
            }
        }
        None
    }

    /// Walks parent pointers from `tail` back to `head` and closes the loop.
    fn reconstruct(&self, tail: &'a str, head: &'a str) -> Vec<&'a str> {
        let mut path = vec![tail];
        let mut current = tail;
        while current != head {
            match self.parent.get(current) {
                Some(&parent) => {
                    current = parent;
                    path.push(current);
                }
                None => break,
            }
        }
        path.reverse();
        path.push(head);
        path
    }
}

/// Outgoing edge counts per node type, and resolvable decision branches.
pub struct OutgoingEdgeRule;

impl ValidationRule for OutgoingEdgeRule {
    fn id(&self) -> &'static str {
        "outgoing-edges"
    }

    fn description(&self) -> &'static str {
        "Inner nodes continue somewhere, end nodes stop, decisions branch two ways"
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::Strict
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (id, type_name, node) in context.typed_nodes() {
            let outgoing = context.successors.of(id);
            let name = node.display_name();

            match type_name.as_str() {
                "decision" | "calculation" | "subprocess" if outgoing.is_empty() => {
                    errors.push(
                        ValidationError::error(
                            ValidationCode::MissingOutgoingEdge,
                            format!("{} node '{name}' has no outgoing edge", capitalize(&type_name)),
                        )
                        .at_node(id),
                    );
                }
                "end" if !outgoing.is_empty() => {
                    errors.push(
                        ValidationError::error(
                            ValidationCode::EndNodeHasOutgoingEdges,
                            format!(
                                "End node '{name}' has {} outgoing edge(s); end nodes must not continue",
                                outgoing.len()
                            ),
                        )
                        .at_node(id),
                    );
                }
                _ => {}
            }

            if type_name != "decision" || outgoing.is_empty() {
                continue;
            }
            if outgoing.len() == 1 {
                errors.push(
                    ValidationError::error(
                        ValidationCode::DecisionInsufficientBranches,
                        format!("Decision '{name}' has only one outgoing edge; two are required"),
                    )
                    .at_node(id),
                );
                continue;
            }

            let children: Vec<_> = outgoing.iter().map(|s| (s.label, s.edge_index)).collect();
            match resolve_branches(&children) {
                Err(BranchError::Ambiguous { children }) => errors.push(
                    ValidationError::error(
                        ValidationCode::DecisionBranchesAmbiguous,
                        format!(
                            "Decision '{name}' has {children} outgoing edges whose branches cannot be resolved; label one edge 'yes' and one 'no'"
                        ),
                    )
                    .at_node(id),
                ),
                Ok(DecisionBranches::Conditional { positional: true, .. })
                    if outgoing
                        .iter()
                        .all(|s| BranchLabel::classify(s.label) == BranchLabel::Unlabeled) =>
                {
                    errors.push(
                        ValidationError::warning(
                            ValidationCode::DecisionBranchesUnlabeled,
                            format!(
                                "Decision '{name}' has unlabelled branches; the first edge is taken when the condition holds"
                            ),
                        )
                        .at_node(id),
                    );
                }
                _ => {}
            }
        }

        errors
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Every node is reachable from the start node.
pub struct ReachabilityRule;

impl ValidationRule for ReachabilityRule {
    fn id(&self) -> &'static str {
        "reachability"
    }

    fn description(&self) -> &'static str {
        "Every node must be reachable from the start node"
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::Strict
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError> {
        let Some(start) = context
            .document
            .nodes
            .iter()
            .find(|node| node.is_type("start"))
            .and_then(|node| node.id.as_deref())
        else {
            return Vec::new();
        };

        let mut visited = AHashSet::new();
        visited.insert(start);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for successor in context.successors.of(node) {
                if visited.insert(successor.target) {
                    queue.push_back(successor.target);
                }
            }
        }

        let unreachable: BTreeSet<&str> = context
            .document
            .nodes
            .iter()
            .filter_map(|node| node.id.as_deref())
            .filter(|id| !visited.contains(id))
            .collect();

        unreachable
            .into_iter()
            .map(|id| {
                let name = context.document.node(id).map_or(id, |n| n.display_name());
                ValidationError::error(
                    ValidationCode::UnreachableNode,
                    format!("Node '{name}' is not reachable from the start node"),
                )
                .at_node(id)
            })
            .collect()
    }
}
