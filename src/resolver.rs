use crate::workflow::Workflow;
use ahash::AHashMap;
use std::sync::Arc;

/// Looks up sub-workflows by id for subprocess nodes.
///
/// Implemented for closures, so a lookup can be passed inline:
///
/// ```rust,no_run
/// use keiro::prelude::*;
/// use std::sync::Arc;
///
/// let library: Vec<Arc<Workflow>> = Vec::new();
/// let interpreter = Interpreter::builder()
///     .with_resolver(move |id: &str| library.iter().find(|w| w.id == id).cloned())
///     .build();
/// ```
pub trait SubworkflowResolver: Send + Sync {
    fn resolve(&self, subworkflow_id: &str) -> Option<Arc<Workflow>>;
}

impl<F> SubworkflowResolver for F
where
    F: Fn(&str) -> Option<Arc<Workflow>> + Send + Sync,
{
    fn resolve(&self, subworkflow_id: &str) -> Option<Arc<Workflow>> {
        self(subworkflow_id)
    }
}

/// A resolver over workflows held in memory, keyed by workflow id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResolver {
    workflows: AHashMap<String, Arc<Workflow>>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.insert(workflow);
        self
    }

    /// Registers a workflow, replacing any earlier one with the same id.
    pub fn insert(&mut self, workflow: Workflow) {
        self.workflows.insert(workflow.id.clone(), Arc::new(workflow));
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

impl SubworkflowResolver for InMemoryResolver {
    fn resolve(&self, subworkflow_id: &str) -> Option<Arc<Workflow>> {
        self.workflows.get(subworkflow_id).cloned()
    }
}
