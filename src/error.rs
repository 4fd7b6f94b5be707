use crate::ast::Value;
use crate::workflow::OutputType;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while tokenizing a condition string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("Unrecognized character '{character}' at position {position} in condition '{input}'")]
    UnexpectedCharacter {
        character: char,
        position: usize,
        input: String,
    },

    #[error("Unterminated string starting at position {position} in condition '{input}'")]
    UnterminatedString { position: usize, input: String },

    #[error("Malformed number '{text}' at position {position} in condition '{input}'")]
    MalformedNumber {
        text: String,
        position: usize,
        input: String,
    },
}

/// Errors raised while parsing a condition string into an `Expression`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("Condition is empty")]
    Empty,

    #[error("Unexpected '{token}' at position {position} in condition '{input}'; expected end of condition")]
    TrailingTokens {
        token: String,
        position: usize,
        input: String,
    },

    #[error("Missing operand at position {position} in condition '{input}'")]
    MissingOperand { position: usize, input: String },

    #[error("Missing closing parenthesis for '(' at position {position} in condition '{input}'")]
    UnclosedParenthesis { position: usize, input: String },
}

/// Errors that can occur while evaluating a condition against a context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Variable '{0}' not found in the execution context")]
    VariableNotFound(String),

    #[error("Unknown comparator '{0}'")]
    UnknownComparator(String),

    #[error("Comparator '{comparator}' expects a number but received boolean value '{found}'")]
    BooleanInNumericComparison { comparator: String, found: Value },

    #[error(
        "Type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: Value,
    },

    #[error("Comparator '{0}' requires a second value ('value2')")]
    MissingSecondValue(String),

    #[error("Cannot parse '{0}' as an ISO-8601 date")]
    InvalidDate(String),
}

/// Errors raised by calculation operators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculationError {
    #[error("Unknown calculation operator '{0}'")]
    UnknownOperator(String),

    #[error("Operator '{operator}' expects {expected} operand(s), but received {found}")]
    Arity {
        operator: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("Division by zero in '{0}'")]
    DivisionByZero(&'static str),

    #[error("Operator '{operator}' is undefined for {value}")]
    Domain { operator: &'static str, value: f64 },
}

/// Decision branch selection failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BranchError {
    #[error("decision has no outgoing connections")]
    NoChildren,

    #[error(
        "{children} outgoing connections could not be mapped to a true and a false branch; label them yes/no"
    )]
    Ambiguous { children: usize },
}

/// A value that could not be converted to a declared output type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot convert '{value}' to output type '{output_type}'")]
pub struct CoercionError {
    pub value: String,
    pub output_type: OutputType,
}

/// Errors that can occur when converting a `WorkflowDocument` into a typed `Workflow`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Node at index {index} is missing its '{field}' field")]
    MissingNodeField { index: usize, field: &'static str },

    #[error("Node '{node_id}' has an unknown type '{type_name}'")]
    UnknownNodeType { node_id: String, type_name: String },

    #[error("Node '{node_id}' is missing required field '{field}'")]
    MissingField {
        node_id: String,
        field: &'static str,
    },

    #[error("Node '{node_id}' has an invalid '{field}' payload: {message}")]
    InvalidPayload {
        node_id: String,
        field: &'static str,
        message: String,
    },

    #[error("Edge at index {index} is missing its '{field}' endpoint")]
    MissingEdgeEndpoint { index: usize, field: &'static str },

    #[error("Workflow output type '{0}' is not recognised")]
    UnknownOutputType(String),
}

/// Errors that abort a single workflow execution.
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("Invalid input for '{variable}': {message}")]
    InvalidInput { variable: String, message: String },

    #[error("Workflow '{0}' has no start node")]
    MissingStartNode(String),

    #[error("Node '{0}' has no outgoing connection to continue from")]
    MissingChild(String),

    #[error("Could not choose a branch at decision '{node_id}': {source}")]
    Branch {
        node_id: String,
        #[source]
        source: BranchError,
    },

    #[error("Decision '{node_id}' has an unusable condition: {source}")]
    InvalidCondition {
        node_id: String,
        #[source]
        source: ParseError,
    },

    #[error("Evaluation failed at node '{node_id}': {source}")]
    Evaluation {
        node_id: String,
        #[source]
        source: EvaluationError,
    },

    #[error("Calculation '{node_id}' failed: {source}")]
    Calculation {
        node_id: String,
        #[source]
        source: CalculationError,
    },

    #[error("Derived variable '{0}' collides with a declared variable id")]
    DerivedVariableCollision(String),

    #[error("Sub-workflow '{0}' could not be resolved")]
    UnresolvedSubworkflow(String),

    #[error("Sub-workflow cycle detected: {chain}")]
    SubworkflowCycle { chain: String },

    #[error("Variable '{variable}' mapped into sub-workflow '{subworkflow_id}' has no value")]
    MissingMappedValue {
        variable: String,
        subworkflow_id: String,
    },

    #[error("Sub-workflow '{subworkflow_id}' failed: {source}")]
    Subworkflow {
        subworkflow_id: String,
        #[source]
        source: Box<ExecutionError>,
    },

    #[error("Output of node '{node_id}' is invalid: {source}")]
    OutputCoercion {
        node_id: String,
        #[source]
        source: CoercionError,
    },

    #[error("Workflow graph contains a cycle through node '{0}'")]
    CyclicGraph(String),

    #[error("Edge from '{from}' points to unknown node '{to}'")]
    DanglingEdge { from: String, to: String },

    #[error("Execution was stopped")]
    Stopped,
}

/// Structural failures that abort a whole source compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Workflow '{0}' has no nodes to compile")]
    NoNodes(String),

    #[error("Workflow '{0}' has no start node")]
    MissingStartNode(String),
}

/// Errors raised while loading workflow documents or input files.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON from '{origin}': {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{path}' is not a usable workflow: {source}")]
    Conversion {
        path: PathBuf,
        #[source]
        source: ConversionError,
    },
}
