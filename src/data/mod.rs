//! Loading input values and workflow libraries from disk.

mod inputs;
mod library;

pub use inputs::InputFile;
pub use library::{WorkflowLibrary, load_workflow};
