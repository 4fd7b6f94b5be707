use crate::error::DataError;
use crate::resolver::InMemoryResolver;
use crate::workflow::{IntoWorkflow, Workflow, WorkflowDocument};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads a workflow file and converts it into the typed model.
///
/// Conversion problems are reported as [`DataError::Conversion`]; run the
/// validator on the document first for a full report.
pub fn load_workflow<P: AsRef<Path>>(path: P) -> Result<Workflow, DataError> {
    let path = path.as_ref();
    WorkflowDocument::from_file(path)?
        .into_workflow()
        .map_err(|source| DataError::Conversion {
            path: path.to_path_buf(),
            source,
        })
}

/// Every workflow found in a directory, for resolving subprocess nodes.
#[derive(Debug, Default)]
pub struct WorkflowLibrary {
    resolver: InMemoryResolver,
    skipped: Vec<PathBuf>,
}

impl WorkflowLibrary {
    /// Loads each `*.json` file in `dir` (not recursive).
    ///
    /// Files that are not convertible workflows are skipped with a warning and
    /// listed in [`WorkflowLibrary::skipped`]. Only an unreadable directory is an error.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, DataError> {
        let dir = dir.as_ref();
        let io_error = |source| DataError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        // Later files win on duplicate ids, so make the order stable.
        paths.sort();

        let mut library = Self::default();
        for path in paths {
            match load_workflow(&path) {
                Ok(workflow) => {
                    debug!(path = %path.display(), workflow_id = %workflow.id, "Loaded sub-workflow");
                    library.resolver.insert(workflow);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping file that is not a workflow");
                    library.skipped.push(path);
                }
            }
        }
        Ok(library)
    }

    pub fn len(&self) -> usize {
        self.resolver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolver.is_empty()
    }

    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    pub fn into_resolver(self) -> InMemoryResolver {
        self.resolver
    }
}
