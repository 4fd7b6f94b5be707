use crate::ast::Value;
use crate::error::DataError;
use crate::interpreter::InputValues;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Input values as stored in a JSON file: a flat object keyed by variable id or name.
///
/// ```json
/// { "bmi": 15.2, "Patient name": "Ada" }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct InputFile {
    values: BTreeMap<String, serde_json::Value>,
}

impl InputFile {
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        serde_json::from_str(json).map_err(|source| DataError::Json {
            origin: "<string>".to_string(),
            source,
        })
    }

    /// Load input values from a JSON file.
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

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts the raw JSON values into interpreter inputs.
    pub fn into_values(self) -> InputValues {
        self.values
            .into_iter()
            .map(|(key, value)| (key, Value::from(value)))
            .collect()
    }
}
