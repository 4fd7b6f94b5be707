use crate::error::ExecutionError;
use crate::workflow::{Node, SuccessorIndex, Workflow};
use ahash::{AHashMap, AHashSet};
use std::rc::Rc;

/// A node with its resolved children. Shared subtrees are built once.
#[derive(Debug)]
pub(super) struct TreeNode<'w> {
    pub node: &'w Node,
    pub children: Vec<TreeEdge<'w>>,
}

#[derive(Debug)]
pub(super) struct TreeEdge<'w> {
    pub label: Option<&'w str>,
    pub child: Rc<TreeNode<'w>>,
}

impl TreeNode<'_> {
    /// The child a start, calculation or subprocess node continues to.
    pub fn next(&self) -> Result<&Rc<Self>, ExecutionError> {
        self.children
            .first()
            .map(|edge| &edge.child)
            .ok_or_else(|| ExecutionError::MissingChild(self.node.id.clone()))
    }
}

/// Builds the nested execution tree reachable from `root`.
pub(super) fn build_tree<'w>(
    workflow: &'w Workflow,
    root: &'w Node,
) -> Result<Rc<TreeNode<'w>>, ExecutionError> {
    let mut builder = TreeBuilder {
        workflow,
        index: workflow.successor_index(),
        memo: AHashMap::new(),
        visiting: AHashSet::new(),
    };
    builder.build(root)
}

struct TreeBuilder<'w> {
    workflow: &'w Workflow,
    index: SuccessorIndex<'w>,
    memo: AHashMap<&'w str, Rc<TreeNode<'w>>>,
    visiting: AHashSet<&'w str>,
}

impl<'w> TreeBuilder<'w> {
    /// Post-order construction on an explicit stack; each frame is a node and
    /// the position of the next successor to descend into.
    fn build(&mut self, root: &'w Node) -> Result<Rc<TreeNode<'w>>, ExecutionError> {
        let mut stack: Vec<(&'w Node, usize)> = vec![(root, 0)];
        self.visiting.insert(root.id.as_str());

        while let Some(frame) = stack.last_mut() {
            let (node, position) = *frame;
            let successors = self.index.of(&node.id);

            if let Some(successor) = successors.get(position) {
                frame.1 += 1;
                if self.memo.contains_key(successor.target) {
                    continue;
                }
                let target = self.workflow.node(successor.target).ok_or_else(|| {
                    ExecutionError::DanglingEdge {
                        from: node.id.clone(),
                        to: successor.target.to_string(),
                    }
                })?;
                if !self.visiting.insert(target.id.as_str()) {
                    return Err(ExecutionError::CyclicGraph(target.id.clone()));
                }
                stack.push((target, 0));
                continue;
            }

            let children = successors
                .iter()
                .filter_map(|successor| {
                    self.memo.get(successor.target).map(|child| TreeEdge {
                        label: successor.label,
                        child: Rc::clone(child),
                    })
                })
                .collect();
            self.visiting.remove(node.id.as_str());
            self.memo
                .insert(node.id.as_str(), Rc::new(TreeNode { node, children }));
            stack.pop();
        }

        self.memo
            .get(root.id.as_str())
            .cloned()
            .ok_or_else(|| ExecutionError::MissingChild(root.id.clone()))
    }
}
