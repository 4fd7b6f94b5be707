//! Direct execution of a typed workflow against input values.
//!
//! The interpreter builds a nested tree of the nodes reachable from the start
//! node and walks it: decisions pick a branch, calculations and subprocess
//! calls extend the context, and the first end node reached produces the output.

use crate::ast::Value;
use crate::control::ExecutionControl;
use crate::error::{CalculationError, EvaluationError, ExecutionError};
use crate::evaluator::{evaluate_condition, trace_expression};
use crate::resolver::SubworkflowResolver;
use crate::trace::TraceFormatter;
use crate::workflow::{
    Calculation, CalculationOperator, Condition, DecisionBranches, DecisionCondition, Node,
    NodeKind, Operand,
    SubprocessCall, Workflow, resolve_branches,
};
use ahash::AHashMap;
use itertools::Itertools;
use serde::Serialize;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod inputs;
mod output;
mod scope;
mod step;
mod tree;

pub use inputs::InputValues;
pub use step::{StepError, StepEvent, StepObserver, SubflowFrame};

use scope::Scope;
use tree::TreeNode;

/// How one decision went and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub node_id: String,
    pub outcome: bool,
    /// Human-readable explanation, e.g. `Age (was 20) >= 18`.
    pub reason: String,
}

/// The result of a sub-workflow call made by a subprocess node.
#[derive(Debug, Clone, Serialize)]
pub struct SubflowResult {
    pub node_id: String,
    pub subworkflow_id: String,
    pub result: ExecutionResult,
}

/// The outcome of an execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Set when the run was cancelled; a stopped run is not an error.
    pub stopped: bool,
    pub output: Option<Value>,
    /// Visited node ids, in order. Partial when the run failed.
    pub path: Vec<String>,
    /// Final variable id to value map.
    pub context: AHashMap<String, Value>,
    pub error: Option<String>,
    pub subflow_results: Vec<SubflowResult>,
    pub decisions: Vec<DecisionRecord>,
    pub warnings: Vec<String>,
}

/// Mutable record of one workflow run, root or nested.
#[derive(Default)]
struct Frame {
    path: Vec<String>,
    context: AHashMap<String, Value>,
    decisions: Vec<DecisionRecord>,
    warnings: Vec<String>,
    subflow_results: Vec<SubflowResult>,
}

impl Frame {
    fn finish(self, outcome: Result<Value, ExecutionError>) -> ExecutionResult {
        let (success, stopped, output, error) = match outcome {
            Ok(value) => (true, false, Some(value), None),
            Err(ExecutionError::Stopped) => (false, true, None, None),
            Err(e) => (false, false, None, Some(e.to_string())),
        };
        ExecutionResult {
            success,
            stopped,
            output,
            path: self.path,
            context: self.context,
            error,
            subflow_results: self.subflow_results,
            decisions: self.decisions,
            warnings: self.warnings,
        }
    }
}

/// State shared by a root run and every sub-workflow it spawns.
#[derive(Default)]
struct RunState {
    step_index: usize,
    /// Keys of workflows currently executing, root first. The root is keyed by
    /// its id, sub-workflows by the id they were resolved under.
    call_stack: Vec<String>,
}

/// Executes workflows. Cheap to share; holds no per-run state.
pub struct Interpreter {
    resolver: Option<Arc<dyn SubworkflowResolver>>,
    observer: Option<Arc<dyn StepObserver>>,
    control: Option<ExecutionControl>,
}

#[derive(Default)]
pub struct InterpreterBuilder {
    resolver: Option<Arc<dyn SubworkflowResolver>>,
    observer: Option<Arc<dyn StepObserver>>,
    control: Option<ExecutionControl>,
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver<R: SubworkflowResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_shared_resolver(mut self, resolver: Arc<dyn SubworkflowResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_observer<O: StepObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Pause/resume/stop handle checked before every node.
    pub fn with_control(mut self, control: ExecutionControl) -> Self {
        self.control = Some(control);
        self
    }

    pub fn build(self) -> Interpreter {
        Interpreter {
            resolver: self.resolver,
            observer: self.observer,
            control: self.control,
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Interpreter {
    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::new()
    }

    /// Executes `workflow` against `inputs` (keyed by variable id or name).
    ///
    /// Never panics on bad workflows or inputs; failures are reported through
    /// `success`, `stopped` and `error` on the result.
    pub fn execute(&self, workflow: &Workflow, inputs: &InputValues) -> ExecutionResult {
        info!(workflow_id = %workflow.id, "Starting workflow execution");
        let mut state = RunState::default();
        let mut frame = Frame::default();
        let outcome = self.run(&workflow.id, workflow, inputs, &mut state, &mut frame, None);

        match &outcome {
            Ok(_) => info!(
                workflow_id = %workflow.id,
                steps = state.step_index,
                "Workflow execution finished"
            ),
            Err(ExecutionError::Stopped) => info!(workflow_id = %workflow.id, "Workflow execution stopped"),
            Err(e) => warn!(workflow_id = %workflow.id, error = %e, "Workflow execution failed"),
        }
        frame.finish(outcome)
    }

    fn run(
        &self,
        key: &str,
        workflow: &Workflow,
        inputs: &InputValues,
        state: &mut RunState,
        frame: &mut Frame,
        subflow: Option<&SubflowFrame>,
    ) -> Result<Value, ExecutionError> {
        if state.call_stack.iter().any(|active| active == key) {
            let chain = state
                .call_stack
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(key))
                .join(" → ");
            return Err(ExecutionError::SubworkflowCycle { chain });
        }

        state.call_stack.push(key.to_string());
        let outcome = self.walk(workflow, inputs, state, frame, subflow);
        state.call_stack.pop();
        outcome
    }

    fn walk(
        &self,
        workflow: &Workflow,
        inputs: &InputValues,
        state: &mut RunState,
        frame: &mut Frame,
        subflow: Option<&SubflowFrame>,
    ) -> Result<Value, ExecutionError> {
        frame.context = inputs::bind_inputs(workflow, inputs)?;

        let start = workflow
            .start_node()
            .ok_or_else(|| ExecutionError::MissingStartNode(workflow.id.clone()))?;
        let scope = Scope::new(workflow);
        let mut current: Rc<TreeNode<'_>> = tree::build_tree(workflow, start)?;

        loop {
            let node = current.node;
            self.before_step(node, state, frame, subflow)?;
            frame.path.push(node.id.clone());
            debug!(node_id = %node.id, node_type = node.kind.type_name(), "Visiting node");

            let next = match &node.kind {
                NodeKind::Start => Rc::clone(current.next()?),
                NodeKind::Decision(condition) => {
                    let children: Vec<_> = current
                        .children
                        .iter()
                        .map(|edge| (edge.label, &edge.child))
                        .collect();
                    let branches =
                        resolve_branches(&children).map_err(|source| ExecutionError::Branch {
                            node_id: node.id.clone(),
                            source,
                        })?;
                    match branches {
                        DecisionBranches::Unconditional(only) => {
                            debug!(node_id = %node.id, "Single branch taken without evaluating");
                            Rc::clone(only)
                        }
                        conditional => {
                            let outcome = self.decide(node, condition, &scope, frame)?;
                            Rc::clone(conditional.select(outcome))
                        }
                    }
                }
                NodeKind::Calculation(calculation) => {
                    self.calculate(node, calculation, &scope, frame)?;
                    Rc::clone(current.next()?)
                }
                NodeKind::Subprocess(call) => {
                    self.call_subworkflow(node, call, &scope, state, frame, subflow)?;
                    Rc::clone(current.next()?)
                }
                NodeKind::End(spec) => {
                    return output::resolve_output(
                        node,
                        spec,
                        &scope,
                        &frame.context,
                        &mut frame.warnings,
                    );
                }
            };
            current = next;
        }
    }

    /// Honors the control handle, then notifies the observer.
    fn before_step(
        &self,
        node: &Node,
        state: &mut RunState,
        frame: &Frame,
        subflow: Option<&SubflowFrame>,
    ) -> Result<(), ExecutionError> {
        if let Some(control) = &self.control {
            control.checkpoint().map_err(|_| ExecutionError::Stopped)?;
        }

        if let Some(observer) = &self.observer {
            let event = StepEvent {
                node_id: node.id.clone(),
                node_type: node.kind.type_name(),
                node_label: node.label.clone(),
                step_index: state.step_index,
                context: frame.context.clone(),
                subflow: subflow.cloned(),
            };
            match observer.on_step(&event) {
                Ok(()) => {}
                Err(StepError::Stopped) => return Err(ExecutionError::Stopped),
                Err(StepError::Failed(message)) => {
                    warn!(node_id = %node.id, %message, "Step observer failed; continuing");
                }
            }
        }

        state.step_index += 1;
        Ok(())
    }

    fn decide(
        &self,
        node: &Node,
        condition: &DecisionCondition,
        scope: &Scope<'_>,
        frame: &mut Frame,
    ) -> Result<bool, ExecutionError> {
        let evaluation_error = |source| ExecutionError::Evaluation {
            node_id: node.id.clone(),
            source,
        };

        let (outcome, reason) = match condition {
            DecisionCondition::Structured(structured) => {
                let outcome =
                    evaluate_condition(structured, &frame.context).map_err(evaluation_error)?;
                (outcome, describe_condition(structured, &frame.context))
            }
            DecisionCondition::Expression { expression, .. } => {
                let names = scope.name_context(&frame.context);
                let trace = trace_expression(expression, &names).map_err(evaluation_error)?;
                (
                    trace.get_outcome().is_truthy(),
                    TraceFormatter::format_trace(&trace),
                )
            }
            DecisionCondition::Invalid { error, .. } => {
                return Err(ExecutionError::InvalidCondition {
                    node_id: node.id.clone(),
                    source: error.clone(),
                });
            }
        };

        debug!(node_id = %node.id, outcome, reason = %reason, "Decision evaluated");
        frame.decisions.push(DecisionRecord {
            node_id: node.id.clone(),
            outcome,
            reason,
        });
        Ok(outcome)
    }

    fn calculate(
        &self,
        node: &Node,
        calculation: &Calculation,
        scope: &Scope<'_>,
        frame: &mut Frame,
    ) -> Result<(), ExecutionError> {
        let calculation_error = |source| ExecutionError::Calculation {
            node_id: node.id.clone(),
            source,
        };

        let operator = CalculationOperator::parse(&calculation.operator).ok_or_else(|| {
            calculation_error(CalculationError::UnknownOperator(
                calculation.operator.clone(),
            ))
        })?;
        let operands = calculation
            .operands
            .iter()
            .map(|operand| operand_value(node, operand, scope, &frame.context))
            .collect::<Result<Vec<_>, _>>()?;
        let result = operator.apply(&operands).map_err(calculation_error)?;

        let id = calculation.derived_id();
        if scope.is_declared(&id) {
            return Err(ExecutionError::DerivedVariableCollision(id));
        }
        debug!(node_id = %node.id, variable = %id, result, "Calculation stored");
        frame.context.insert(id, Value::Float(result));
        Ok(())
    }

    fn call_subworkflow(
        &self,
        node: &Node,
        call: &SubprocessCall,
        scope: &Scope<'_>,
        state: &mut RunState,
        frame: &mut Frame,
        subflow: Option<&SubflowFrame>,
    ) -> Result<(), ExecutionError> {
        if scope.is_declared(&call.output_variable) {
            return Err(ExecutionError::DerivedVariableCollision(
                call.output_variable.clone(),
            ));
        }

        let Some(resolver) = &self.resolver else {
            warn!(
                node_id = %node.id,
                subworkflow_id = %call.subworkflow_id,
                "No sub-workflow resolver configured; injecting null"
            );
            frame.warnings.push(format!(
                "Subprocess '{}' was skipped because no sub-workflow resolver is configured; '{}' is null",
                node.id, call.output_variable
            ));
            frame
                .context
                .insert(call.output_variable.clone(), Value::Null);
            return Ok(());
        };

        let sub = resolver
            .resolve(&call.subworkflow_id)
            .ok_or_else(|| ExecutionError::UnresolvedSubworkflow(call.subworkflow_id.clone()))?;

        let mut sub_inputs = InputValues::new();
        for (parent_variable, sub_input) in &call.input_mapping {
            let value = scope.lookup(&frame.context, parent_variable).ok_or_else(|| {
                ExecutionError::MissingMappedValue {
                    variable: parent_variable.clone(),
                    subworkflow_id: call.subworkflow_id.clone(),
                }
            })?;
            sub_inputs.insert(sub_input.clone(), value.clone());
        }

        let sub_frame = SubflowFrame {
            subworkflow_id: call.subworkflow_id.clone(),
            parent_node_id: node.id.clone(),
            depth: subflow.map_or(1, |parent| parent.depth + 1),
        };
        debug!(node_id = %node.id, subworkflow_id = %call.subworkflow_id, depth = sub_frame.depth, "Entering sub-workflow");

        let mut child = Frame::default();
        let outcome = self.run(
            &call.subworkflow_id,
            &sub,
            &sub_inputs,
            state,
            &mut child,
            Some(&sub_frame),
        );
        let value = outcome.clone();
        frame.subflow_results.push(SubflowResult {
            node_id: node.id.clone(),
            subworkflow_id: call.subworkflow_id.clone(),
            result: child.finish(outcome),
        });

        let value = value.map_err(|e| match e {
            ExecutionError::Stopped | ExecutionError::SubworkflowCycle { .. } => e,
            other => ExecutionError::Subworkflow {
                subworkflow_id: call.subworkflow_id.clone(),
                source: Box::new(other),
            },
        })?;
        let value = match call.output_type {
            Some(output_type) => {
                output_type
                    .coerce(value)
                    .map_err(|source| ExecutionError::OutputCoercion {
                        node_id: node.id.clone(),
                        source,
                    })?
            }
            None => value,
        };

        frame.context.insert(call.output_variable.clone(), value);
        Ok(())
    }
}

fn operand_value(
    node: &Node,
    operand: &Operand,
    scope: &Scope<'_>,
    context: &AHashMap<String, Value>,
) -> Result<f64, ExecutionError> {
    let evaluation_error = |source| ExecutionError::Evaluation {
        node_id: node.id.clone(),
        source,
    };
    let not_a_number = |found: &Value| {
        evaluation_error(EvaluationError::TypeMismatch {
            operation: "calculation".to_string(),
            expected: "a number".to_string(),
            found: found.clone(),
        })
    };

    match operand {
        Operand::Literal { value } => match value {
            Value::String(s) => s.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        }
        .ok_or_else(|| not_a_number(value)),
        Operand::Variable { reference } => {
            let value = scope.lookup(context, reference).ok_or_else(|| {
                evaluation_error(EvaluationError::VariableNotFound(reference.clone()))
            })?;
            value.as_f64().ok_or_else(|| not_a_number(value))
        }
    }
}

/// Reason text for a structured condition, e.g. `bmi (was 23.45) lt 16`.
fn describe_condition(condition: &Condition, context: &AHashMap<String, Value>) -> String {
    let actual = context
        .get(&condition.input_id)
        .map(ToString::to_string)
        .unwrap_or_else(|| "null".to_string());
    match &condition.value2 {
        Some(upper) if !upper.is_null() => format!(
            "{} (was {}) {} {}..{}",
            condition.input_id, actual, condition.comparator, condition.value, upper
        ),
        _ => format!(
            "{} (was {}) {} {}",
            condition.input_id, actual, condition.comparator, condition.value
        ),
    }
}
