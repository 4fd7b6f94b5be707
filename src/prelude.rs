//! Prelude module for convenient imports
//!
//! Re-exports the types needed to validate, execute and compile a workflow.
//!
//! # Example
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let document = WorkflowDocument::from_file("path/to/workflow.json")?;
//! let (valid, errors) = validate_workflow(&document, ValidationMode::Lenient);
//! if !valid {
//!     println!("{}", format_validation_errors(&errors));
//! }
//!
//! let workflow = document.into_workflow()?;
//! let inputs = InputFile::from_file("path/to/inputs.json")?.into_values();
//! let result = Interpreter::default().execute(&workflow, &inputs);
//! println!("Execution Result: {:?}", result);
//! # Ok(())
//! # }
//! ```

// Workflow model
pub use crate::workflow::{
    Condition, IntoWorkflow, Node, NodeKind, OutputType, Variable, VariableType, Workflow,
    WorkflowDocument,
};

// Validation
pub use crate::validator::{
    PrepareError, ValidationCode, ValidationError, ValidationMode, Validator,
    format_validation_errors, validate_workflow,
};

// Execution
pub use crate::control::{ExecutionControl, ExecutionRegistry};
pub use crate::interpreter::{
    ExecutionResult, InputValues, Interpreter, StepError, StepEvent, StepObserver,
};
pub use crate::resolver::{InMemoryResolver, SubworkflowResolver};

// Code generation
pub use crate::codegen::{CompilationResult, SourceCompiler};

// Expressions and evaluation
pub use crate::ast::{EvaluationTrace, Expression, Value};
pub use crate::evaluator::{evaluate_condition, evaluate_expression};
pub use crate::expression::parse;
pub use crate::trace::TraceFormatter;

// Data loading
pub use crate::data::{InputFile, WorkflowLibrary, load_workflow};

// Error types
pub use crate::error::{ConversionError, DataError, EvaluationError, ExecutionError, ParseError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
