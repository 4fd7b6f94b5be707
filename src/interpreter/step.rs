use crate::ast::Value;
use ahash::AHashMap;
use serde::Serialize;
use thiserror::Error;

/// Where a step sits when it runs inside a sub-workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubflowFrame {
    pub subworkflow_id: String,
    /// The subprocess node in the parent that made the call.
    pub parent_node_id: String,
    /// 1 for a direct child of the root workflow.
    pub depth: usize,
}

/// Delivered to the observer immediately before a node executes.
#[derive(Debug, Clone, Serialize)]
pub struct StepEvent {
    pub node_id: String,
    pub node_type: &'static str,
    pub node_label: String,
    /// Global across the root workflow and all of its sub-workflows.
    pub step_index: usize,
    pub context: AHashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subflow: Option<SubflowFrame>,
}

/// Returned by observers and by [`ExecutionControl::checkpoint`](crate::control::ExecutionControl::checkpoint).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// Ends the execution with `stopped = true`.
    #[error("execution stopped")]
    Stopped,

    /// Logged and ignored; execution continues.
    #[error("observer failed: {0}")]
    Failed(String),
}

/// Receives a [`StepEvent`] before every node.
pub trait StepObserver: Send + Sync {
    fn on_step(&self, event: &StepEvent) -> Result<(), StepError>;
}

impl<F> StepObserver for F
where
    F: Fn(&StepEvent) -> Result<(), StepError> + Send + Sync,
{
    fn on_step(&self, event: &StepEvent) -> Result<(), StepError> {
        self(event)
    }
}
