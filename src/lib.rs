//! # Keiro - Decision Workflow Engine
//!
//! **Keiro** validates, executes and compiles decision-tree workflows. A
//! workflow is a directed graph of start, decision, calculation, subprocess and
//! end nodes over a set of typed input variables. The same workflow can be run
//! by the tree interpreter or turned into a standalone Python function.
//!
//! ## Core Workflow
//!
//! 1.  **Load**: Deserialize the uploaded JSON into a [`workflow::WorkflowDocument`].
//!     The document is deliberately lenient so a broken upload still loads.
//! 2.  **Validate**: Run a [`validator::Validator`] in lenient mode while editing
//!     or strict mode before execution. Every problem is reported at once.
//! 3.  **Convert**: Use the [`workflow::IntoWorkflow`] trait to get the typed
//!     [`workflow::Workflow`]. [`validator::Validator::prepare`] does steps 2 and 3 together.
//! 4.  **Execute or compile**: Hand the workflow to an [`interpreter::Interpreter`]
//!     together with input values, or to a [`codegen::SourceCompiler`] to get Python source.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let document = WorkflowDocument::from_file("workflows/bmi.json")?;
//!
//!     // 1. Strict validation, then conversion into the typed model.
//!     let workflow = match Validator::new(ValidationMode::Strict).prepare(&document) {
//!         Ok(workflow) => workflow,
//!         Err(PrepareError::Invalid(errors)) => {
//!             eprintln!("{}", format_validation_errors(&errors));
//!             return Ok(());
//!         }
//!         Err(e) => return Err(e.into()),
//!     };
//!
//!     // 2. Execute against a set of inputs.
//!     let mut inputs = InputValues::new();
//!     inputs.insert("bmi".to_string(), Value::Float(15.2));
//!
//!     let result = Interpreter::builder().build().execute(&workflow, &inputs);
//!     if result.success {
//!         println!("-> Output: {:?}", result.output);
//!         for decision in &result.decisions {
//!             println!("-> {}: {}", decision.node_id, decision.reason);
//!         }
//!     } else {
//!         println!("-> Failed: {}", result.error.unwrap_or_default());
//!     }
//!
//!     // 3. Or generate an equivalent Python function.
//!     let compiled = SourceCompiler::builder(&workflow)
//!         .with_function_name("classify_bmi")
//!         .build()
//!         .compile();
//!     println!("{}", compiled.code);
//!
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod codegen;
pub mod control;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod interpreter;
pub mod prelude;
pub mod resolver;
pub mod trace;
pub mod validator;
pub mod workflow;
