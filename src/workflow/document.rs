use crate::error::DataError;
use crate::workflow::Variable;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Node type names accepted on the wire. `output` is an alias of `end`.
pub const NODE_TYPES: &[&str] = &["start", "decision", "calculation", "subprocess", "end", "output"];

/// A workflow exactly as the front end uploads it.
///
/// Everything is optional so that a malformed upload still deserializes and
/// the validator can report every problem at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
    #[serde(default, alias = "outputType")]
    pub output_type: Option<String>,
}

impl WorkflowDocument {
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        serde_json::from_str(json).map_err(|source| DataError::Json {
            origin: "<string>".to_string(),
            source,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| DataError::Json {
            origin: path.display().to_string(),
            source,
        })
    }

    pub fn node(&self, id: &str) -> Option<&NodeDocument> {
        self.nodes.iter().find(|node| node.id.as_deref() == Some(id))
    }
}

/// A node with its type-specific fields kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl NodeDocument {
    /// Lower-cased type name with `output` folded into `end`.
    pub fn normalized_type(&self) -> Option<String> {
        self.node_type.as_deref().map(|t| match t.trim().to_lowercase().as_str() {
            "output" => "end".to_string(),
            other => other.to_string(),
        })
    }

    pub fn is_type(&self, name: &str) -> bool {
        self.normalized_type().as_deref() == Some(name)
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.data.get(name).filter(|value| !value.is_null())
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(serde_json::Value::as_str)
    }

    /// First non-null field among `names`, for keys accepted in several spellings.
    pub fn field_any(&self, names: &[&str]) -> Option<&serde_json::Value> {
        names.iter().find_map(|name| self.field(name))
    }

    /// Display name used in messages: the label, else the id.
    pub fn display_name(&self) -> &str {
        self.label
            .as_deref()
            .filter(|label| !label.trim().is_empty())
            .or(self.id.as_deref())
            .unwrap_or("<unnamed>")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "source")]
    pub from: Option<String>,
    #[serde(default, alias = "target")]
    pub to: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}
