use crate::ast::{Expression, Value};
use crate::error::{CoercionError, ParseError};
use crate::workflow::condition::Condition;
use crate::workflow::graph::SuccessorIndex;
use crate::workflow::slugify;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The canonical, typed definition of a workflow, ready for execution or compilation.
///
/// Built from a [`WorkflowDocument`](crate::workflow::WorkflowDocument) through
/// [`IntoWorkflow`](crate::workflow::IntoWorkflow).
#[derive(Debug, Clone, Default)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub variables: Vec<Variable>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub output_type: Option<OutputType>,
}

impl Workflow {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn start_node(&self) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|node| matches!(node.kind, NodeKind::Start))
    }

    /// Looks up a declared variable by id first, then by display name.
    pub fn variable(&self, key: &str) -> Option<&Variable> {
        self.variables
            .iter()
            .find(|v| v.id == key)
            .or_else(|| self.variables.iter().find(|v| v.name == key))
    }

    pub fn input_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables
            .iter()
            .filter(|v| v.source == VariableSource::Input)
    }

    /// Variables created implicitly by calculation and subprocess nodes, in node order.
    pub fn derived_variables(&self) -> Vec<Variable> {
        self.nodes
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::Calculation(calc) => Some(Variable {
                    id: calc.derived_id(),
                    name: calc.output_name.clone(),
                    var_type: VariableType::Float,
                    range: None,
                    enum_values: None,
                    source: VariableSource::Calculated,
                }),
                NodeKind::Subprocess(call) => Some(Variable {
                    id: call.output_variable.clone(),
                    name: call.output_variable.clone(),
                    var_type: call
                        .output_type
                        .map(OutputType::variable_type)
                        .unwrap_or(VariableType::String),
                    range: None,
                    enum_values: None,
                    source: VariableSource::Subprocess,
                }),
                _ => None,
            })
            .collect()
    }

    /// Output type of the workflow: the declared one, else the first end node's.
    pub fn effective_output_type(&self) -> OutputType {
        self.output_type.unwrap_or_else(|| {
            self.nodes
                .iter()
                .find_map(|node| match &node.kind {
                    NodeKind::End(spec) => Some(spec.output_type),
                    _ => None,
                })
                .unwrap_or_default()
        })
    }

    pub fn successor_index(&self) -> SuccessorIndex<'_> {
        SuccessorIndex::from_edges(
            self.edges
                .iter()
                .enumerate()
                .map(|(i, edge)| (i, edge.from.as_str(), edge.to.as_str(), edge.label.as_deref())),
        )
    }
}

/// A declared workflow variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ValueRange>,
    #[serde(default, alias = "enumValues", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub source: VariableSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "number")]
    Float,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "str", alias = "text")]
    String,
    Enum,
    Date,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Int => "int",
            VariableType::Float => "float",
            VariableType::Bool => "bool",
            VariableType::String => "string",
            VariableType::Enum => "enum",
            VariableType::Date => "date",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, VariableType::Int | VariableType::Float)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive numeric bounds; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl ValueRange {
    pub fn contains(&self, n: f64) -> bool {
        self.min.is_none_or(|min| n >= min) && self.max.is_none_or(|max| n <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableSource {
    #[default]
    Input,
    Calculated,
    Subprocess,
}

/// A single node of the workflow graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub kind: NodeKind,
}

/// Node payloads, one variant per node type.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Start,
    Decision(DecisionCondition),
    Calculation(Calculation),
    Subprocess(SubprocessCall),
    End(OutputSpec),
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Decision(_) => "decision",
            NodeKind::Calculation(_) => "calculation",
            NodeKind::Subprocess(_) => "subprocess",
            NodeKind::End(_) => "end",
        }
    }
}

/// How a decision node decides.
///
/// Structured conditions win over the label; a label that fails to parse is
/// kept as `Invalid` so execution and compilation can report it at the node.
#[derive(Debug, Clone)]
pub enum DecisionCondition {
    Structured(Condition),
    Expression {
        source: String,
        expression: Expression,
    },
    Invalid {
        source: String,
        error: ParseError,
    },
}

/// `{output_name, operator, operands}` payload of a calculation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    #[serde(alias = "outputName")]
    pub output_name: String,
    pub operator: String,
    #[serde(default)]
    pub operands: Vec<Operand>,
}

impl Calculation {
    /// Id of the variable this calculation writes.
    pub fn derived_id(&self) -> String {
        slugify(&self.output_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Operand {
    Literal {
        value: Value,
    },
    Variable {
        #[serde(rename = "ref")]
        reference: String,
    },
}

/// Payload of a subprocess node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubprocessCall {
    #[serde(alias = "subworkflowId")]
    pub subworkflow_id: String,
    /// Parent variable id (or name) to sub-workflow input id.
    #[serde(alias = "inputMapping")]
    pub input_mapping: BTreeMap<String, String>,
    #[serde(alias = "outputVariable")]
    pub output_variable: String,
    #[serde(default, alias = "outputType")]
    pub output_type: Option<OutputType>,
}

/// What an end node produces.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(default, alias = "outputType")]
    pub output_type: OutputType,
    #[serde(default, alias = "outputTemplate", alias = "template")]
    pub output_template: Option<String>,
    #[serde(default, alias = "outputValue")]
    pub output_value: Option<Value>,
}

impl OutputSpec {
    pub fn template(&self) -> Option<&str> {
        self.output_template
            .as_deref()
            .filter(|template| !template.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    #[serde(alias = "str", alias = "text")]
    String,
    Number,
    #[serde(alias = "integer")]
    Int,
    Float,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "object")]
    Json,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::String => "string",
            OutputType::Number => "number",
            OutputType::Int => "int",
            OutputType::Float => "float",
            OutputType::Bool => "bool",
            OutputType::Json => "json",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.trim().to_lowercase())).ok()
    }

    pub fn variable_type(self) -> VariableType {
        match self {
            OutputType::Int => VariableType::Int,
            OutputType::Number | OutputType::Float => VariableType::Float,
            OutputType::Bool => VariableType::Bool,
            OutputType::String | OutputType::Json => VariableType::String,
        }
    }

    /// Converts a value to this output type.
    pub fn coerce(self, value: Value) -> Result<Value, CoercionError> {
        let fail = |value: &Value| CoercionError {
            value: value.to_string(),
            output_type: self,
        };

        match self {
            OutputType::String => Ok(match value {
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            }),
            OutputType::Number => match value {
                Value::Int(_) | Value::Float(_) => Ok(value),
                Value::String(ref s) => parse_number(s).ok_or_else(|| fail(&value)),
                other => Err(fail(&other)),
            },
            OutputType::Int => match value {
                Value::Int(_) => Ok(value),
                Value::Float(n) if n.is_finite() => Ok(Value::Int(n.trunc() as i64)),
                Value::String(ref s) => match parse_number(s) {
                    Some(Value::Float(n)) if n.is_finite() => Ok(Value::Int(n.trunc() as i64)),
                    Some(Value::Int(n)) => Ok(Value::Int(n)),
                    _ => Err(fail(&value)),
                },
                other => Err(fail(&other)),
            },
            OutputType::Float => match value {
                Value::Int(n) => Ok(Value::Float(n as f64)),
                Value::Float(_) => Ok(value),
                Value::String(ref s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| fail(&value)),
                other => Err(fail(&other)),
            },
            OutputType::Bool => match value {
                Value::Bool(_) => Ok(value),
                Value::Int(n) => Ok(Value::Bool(n != 0)),
                Value::String(ref s) => parse_bool(s).map(Value::Bool).ok_or_else(|| fail(&value)),
                other => Err(fail(&other)),
            },
            OutputType::Json => match value {
                Value::String(ref s) => serde_json::from_str::<serde_json::Value>(s)
                    .map(Value::Json)
                    .map_err(|_| fail(&value)),
                other => Ok(Value::Json(other.to_json())),
            },
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    text.parse::<i64>()
        .map(Value::Int)
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(Value::Float))
}

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "t" | "1" => Some(true),
        "false" | "no" | "n" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}
