//! Rule-based validation of uploaded workflow documents.
//!
//! Validation runs on the raw [`WorkflowDocument`] so that every problem in a
//! malformed upload is reported at once, before conversion to a typed
//! [`Workflow`]. Each check is a [`ValidationRule`]; the [`Validator`] runs the
//! rules that apply to its [`ValidationMode`] and accumulates their findings.
//!
//! # Usage
//!
//! ```rust,no_run
//! use keiro::validator::{ValidationMode, format_validation_errors, validate_workflow};
//! use keiro::workflow::WorkflowDocument;
//!
//! let document = WorkflowDocument::from_file("triage.json").unwrap();
//! let (valid, errors) = validate_workflow(&document, ValidationMode::Strict);
//! if !valid {
//!     eprintln!("{}", format_validation_errors(&errors));
//! }
//! ```
//!
//! # Adding a rule
//!
//! Implement [`ValidationRule`] in `validator/rules/` and register it in
//! [`Validator::new`], or attach it at runtime with [`Validator::with_rule`].

pub mod rules;

use crate::error::ConversionError;
use crate::workflow::{
    IntoWorkflow, NodeDocument, OutputType, SuccessorIndex, VariableType, Workflow, WorkflowDocument,
    slugify,
};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// How much the validator checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Structural checks only: fields, ids, edges, start nodes, loops.
    Lenient,
    /// Structural plus semantic checks.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Stable machine-readable code of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    MissingRequiredField,
    UnknownNodeType,
    DuplicateNodeId,
    DuplicateEdgeId,
    DuplicateVariableId,
    InvalidEdgeReference,
    MultipleStartNodes,
    MissingStartNode,
    SelfLoopDetected,
    CycleDetected,
    MissingOutgoingEdge,
    EndNodeHasOutgoingEdges,
    DecisionInsufficientBranches,
    DecisionBranchesAmbiguous,
    DecisionBranchesUnlabeled,
    UnreachableNode,
    MissingCondition,
    InvalidCondition,
    InvalidConditionSyntax,
    UnknownConditionVariable,
    UnknownComparator,
    InvalidComparator,
    InvalidSubprocess,
    InvalidInputMapping,
    InvalidOutputVariable,
    UnknownMappedVariable,
    InvalidCalculation,
    UnknownOperator,
    UnknownOperandVariable,
    DerivedVariableCollision,
    UndeclaredTemplateVariable,
    OutputTypeMismatch,
    UnknownOutputType,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        use ValidationCode::*;
        match self {
            MissingRequiredField => "MISSING_REQUIRED_FIELD",
            UnknownNodeType => "UNKNOWN_NODE_TYPE",
            DuplicateNodeId => "DUPLICATE_NODE_ID",
            DuplicateEdgeId => "DUPLICATE_EDGE_ID",
            DuplicateVariableId => "DUPLICATE_VARIABLE_ID",
            InvalidEdgeReference => "INVALID_EDGE_REFERENCE",
            MultipleStartNodes => "MULTIPLE_START_NODES",
            MissingStartNode => "MISSING_START_NODE",
            SelfLoopDetected => "SELF_LOOP_DETECTED",
            CycleDetected => "CYCLE_DETECTED",
            MissingOutgoingEdge => "MISSING_OUTGOING_EDGE",
            EndNodeHasOutgoingEdges => "END_NODE_HAS_OUTGOING_EDGES",
            DecisionInsufficientBranches => "DECISION_INSUFFICIENT_BRANCHES",
            DecisionBranchesAmbiguous => "DECISION_BRANCHES_AMBIGUOUS",
            DecisionBranchesUnlabeled => "DECISION_BRANCHES_UNLABELED",
            UnreachableNode => "UNREACHABLE_NODE",
            MissingCondition => "MISSING_CONDITION",
            InvalidCondition => "INVALID_CONDITION",
            InvalidConditionSyntax => "INVALID_CONDITION_SYNTAX",
            UnknownConditionVariable => "UNKNOWN_CONDITION_VARIABLE",
            UnknownComparator => "UNKNOWN_COMPARATOR",
            InvalidComparator => "INVALID_COMPARATOR",
            InvalidSubprocess => "INVALID_SUBPROCESS",
            InvalidInputMapping => "INVALID_INPUT_MAPPING",
            InvalidOutputVariable => "INVALID_OUTPUT_VARIABLE",
            UnknownMappedVariable => "UNKNOWN_MAPPED_VARIABLE",
            InvalidCalculation => "INVALID_CALCULATION",
            UnknownOperator => "UNKNOWN_OPERATOR",
            UnknownOperandVariable => "UNKNOWN_OPERAND_VARIABLE",
            DerivedVariableCollision => "DERIVED_VARIABLE_COLLISION",
            UndeclaredTemplateVariable => "UNDECLARED_TEMPLATE_VARIABLE",
            OutputTypeMismatch => "OUTPUT_TYPE_MISMATCH",
            UnknownOutputType => "UNKNOWN_OUTPUT_TYPE",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding of the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
    pub severity: Severity,
}

impl ValidationError {
    pub fn error(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            node_id: None,
            edge_id: None,
            severity: Severity::Error,
        }
    }

    pub fn warning(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn at_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn at_edge(mut self, edge_id: Option<&str>) -> Self {
        self.edge_id = edge_id.map(str::to_string);
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Everything found in one validation pass, in rule order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub mode: ValidationMode,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// Valid means no finding of `Error` severity. Warnings are allowed.
    pub fn is_valid(&self) -> bool {
        !self.errors.iter().any(ValidationError::is_error)
    }

    pub fn has_code(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(|e| !e.is_error())
    }

    pub fn into_parts(self) -> (bool, Vec<ValidationError>) {
        (self.is_valid(), self.errors)
    }
}

/// A variable visible to conditions, templates and mappings.
#[derive(Debug, Clone)]
pub struct ScopedVariable {
    pub id: String,
    pub name: String,
    /// `None` when a derived variable's type cannot be determined.
    pub var_type: Option<VariableType>,
}

/// Declared plus derived variables of a document.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    declared: Vec<ScopedVariable>,
    derived: Vec<ScopedVariable>,
}

impl VariableScope {
    fn from_document(document: &WorkflowDocument) -> Self {
        let declared = document
            .variables
            .iter()
            .map(|v| ScopedVariable {
                id: v.id.clone(),
                name: v.name.clone(),
                var_type: Some(v.var_type),
            })
            .collect();

        let derived = document
            .nodes
            .iter()
            .filter_map(|node| {
                if node.is_type("calculation") {
                    let calculation = node.field("calculation")?;
                    let name = calculation
                        .get("output_name")
                        .or_else(|| calculation.get("outputName"))?
                        .as_str()?;
                    Some(ScopedVariable {
                        id: slugify(name),
                        name: name.to_string(),
                        var_type: Some(VariableType::Float),
                    })
                } else if node.is_type("subprocess") {
                    let id = node
                        .field_any(&["output_variable", "outputVariable"])?
                        .as_str()?;
                    let var_type = node
                        .field_any(&["output_type", "outputType"])
                        .and_then(serde_json::Value::as_str)
                        .map_or(Some(VariableType::String), |name| {
                            OutputType::parse(name).map(OutputType::variable_type)
                        });
                    Some(ScopedVariable {
                        id: id.to_string(),
                        name: id.to_string(),
                        var_type,
                    })
                } else {
                    None
                }
            })
            .collect();

        Self { declared, derived }
    }

    pub fn all(&self) -> impl Iterator<Item = &ScopedVariable> {
        self.declared.iter().chain(self.derived.iter())
    }

    pub fn declared(&self) -> &[ScopedVariable] {
        &self.declared
    }

    pub fn derived(&self) -> &[ScopedVariable] {
        &self.derived
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty() && self.derived.is_empty()
    }

    pub fn find_id(&self, id: &str) -> Option<&ScopedVariable> {
        self.all().find(|v| v.id == id)
    }

    /// Finds a variable by id, then display name.
    pub fn find_named(&self, key: &str) -> Option<&ScopedVariable> {
        self.find_id(key)
            .or_else(|| self.all().find(|v| v.name == key))
    }

    /// Finds a variable by id, then display name, then slugified name.
    pub fn find(&self, key: &str) -> Option<&ScopedVariable> {
        self.find_named(key).or_else(|| self.find_id(&slugify(key)))
    }

    /// Comma-separated ids and names, for error messages.
    pub fn describe(&self) -> String {
        let mut seen = AHashSet::new();
        let names: Vec<&str> = self
            .all()
            .flat_map(|v| [v.id.as_str(), v.name.as_str()])
            .filter(|name| seen.insert(*name))
            .collect();
        if names.is_empty() {
            "none declared".to_string()
        } else {
            names.join(", ")
        }
    }
}

/// What a rule sees of the document being validated.
pub struct RuleContext<'a> {
    pub document: &'a WorkflowDocument,
    pub mode: ValidationMode,
    /// Outgoing edges of every node, in edge order. Edges with a missing endpoint are left out.
    pub successors: SuccessorIndex<'a>,
    pub scope: VariableScope,
}

impl<'a> RuleContext<'a> {
    pub fn new(document: &'a WorkflowDocument, mode: ValidationMode) -> Self {
        let successors = SuccessorIndex::from_edges(
            document.edges.iter().enumerate().filter_map(|(i, edge)| {
                Some((i, edge.from.as_deref()?, edge.to.as_deref()?, edge.label.as_deref()))
            }),
        );
        Self {
            document,
            mode,
            successors,
            scope: VariableScope::from_document(document),
        }
    }

    /// Nodes with both an id and a type, paired with their normalised type.
    pub fn typed_nodes(&self) -> impl Iterator<Item = (&'a str, String, &'a NodeDocument)> {
        let document = self.document;
        document.nodes.iter().filter_map(|node| {
            Some((node.id.as_deref()?, node.normalized_type()?, node))
        })
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.document.nodes.iter().any(|n| n.id.as_deref() == Some(id))
    }

    pub fn is_strict(&self) -> bool {
        self.mode == ValidationMode::Strict
    }
}

/// One independent check over a workflow document.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier, e.g. `cycle-detection`.
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// The least strict mode the rule runs in.
    fn mode(&self) -> ValidationMode {
        ValidationMode::Lenient
    }

    fn validate(&self, context: &RuleContext<'_>) -> Vec<ValidationError>;
}

/// Raised by [`Validator::prepare`].
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Workflow failed validation with {} error(s)", .0.iter().filter(|e| e.is_error()).count())]
    Invalid(Vec<ValidationError>),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Runs the registered rules that apply to its mode.
pub struct Validator {
    mode: ValidationMode,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// A validator with every built-in rule.
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            rules: vec![
                Box::new(rules::RequiredFieldsRule),
                Box::new(rules::DuplicateIdRule),
                Box::new(rules::EdgeReferenceRule),
                Box::new(rules::StartNodeRule),
                Box::new(rules::SelfLoopRule),
                Box::new(rules::CycleRule),
                Box::new(rules::OutgoingEdgeRule),
                Box::new(rules::ReachabilityRule),
                Box::new(rules::DecisionConditionRule),
                Box::new(rules::SubprocessRule),
                Box::new(rules::CalculationRule),
                Box::new(rules::DerivedVariableRule),
                Box::new(rules::OutputTemplateRule),
                Box::new(rules::OutputTypeRule),
            ],
        }
    }

    pub fn with_rule<R: ValidationRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// `(id, description)` of every registered rule.
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }

    pub fn validate(&self, document: &WorkflowDocument) -> ValidationReport {
        let context = RuleContext::new(document, self.mode);
        let mut errors = Vec::new();
        for rule in self.rules.iter().filter(|rule| rule.mode() <= self.mode) {
            let found = rule.validate(&context);
            if !found.is_empty() {
                debug!(rule = rule.id(), count = found.len(), "Validation rule reported issues");
            }
            errors.extend(found);
        }

        let report = ValidationReport {
            mode: self.mode,
            errors,
        };
        info!(
            workflow_id = document.id.as_deref().unwrap_or(""),
            mode = ?self.mode,
            valid = report.is_valid(),
            issues = report.errors.len(),
            "Workflow validated"
        );
        report
    }

    /// Validates and, when no error was found, converts to a typed workflow.
    pub fn prepare(&self, document: &WorkflowDocument) -> Result<Workflow, PrepareError> {
        let report = self.validate(document);
        if !report.is_valid() {
            return Err(PrepareError::Invalid(report.errors));
        }
        Ok(document.into_workflow()?)
    }
}

/// Validates `document` with every built-in rule for `mode`.
///
/// Returns whether it is valid (warnings allowed) and every finding.
pub fn validate_workflow(
    document: &WorkflowDocument,
    mode: ValidationMode,
) -> (bool, Vec<ValidationError>) {
    Validator::new(mode).validate(document).into_parts()
}

/// One line per finding: `• <message> (node: <id>)`.
pub fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|error| match (&error.node_id, &error.edge_id) {
            (Some(node), _) => format!("• {} (node: {})", error.message, node),
            (None, Some(edge)) => format!("• {} (edge: {})", error.message, edge),
            (None, None) => format!("• {}", error.message),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
