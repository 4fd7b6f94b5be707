//! Compiles a workflow into a standalone Python function.
//!
//! The generated code mirrors the interpreter: decisions become nested
//! `if`/`else` blocks, calculations become assignments, subprocess nodes call
//! a helper function generated for the sub-workflow, and end nodes `return`.
//!
//! Only structural problems (no nodes, no start node) abort compilation.
//! Anything wrong with a single node is written into the output as a
//! `# WARNING:` comment followed by a fallback statement, and reported in
//! [`CompilationResult::warnings`].

use crate::error::CompileError;
use crate::resolver::SubworkflowResolver;
use crate::workflow::{OutputType, Workflow};
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

mod expressions;
mod function;
mod naming;
mod writer;

pub use naming::to_identifier;

use expressions::Prelude;
use function::{FunctionEmitter, Param, parameters};
use naming::NameTable;
use writer::CodeWriter;

const DEFAULT_INDENT: usize = 4;
const DEFAULT_FUNCTION_NAME: &str = "evaluate";

/// Renders a value the way the interpreter displays it.
const FMT_HELPER: &[(usize, &str)] = &[
    (0, "def _fmt(value):"),
    (1, "if value is None:"),
    (2, "return 'null'"),
    (1, "if isinstance(value, bool):"),
    (2, "return 'true' if value else 'false'"),
    (1, "if isinstance(value, float) and value.is_integer() and abs(value) < 1e15:"),
    (2, "return str(int(value))"),
    (1, "return str(value)"),
];

/// Parses an ISO-8601 date or date-time; aware values become naive UTC.
const DATE_HELPER: &[(usize, &str)] = &[
    (0, "def _date(value):"),
    (1, "text = value.strip()"),
    (1, "if text.endswith(('Z', 'z')):"),
    (2, "text = text[:-1] + '+00:00'"),
    (1, "parsed = datetime.fromisoformat(text)"),
    (1, "if parsed.tzinfo is not None:"),
    (2, "parsed = parsed.astimezone(timezone.utc).replace(tzinfo=None)"),
    (1, "return parsed"),
];

/// Output conversion with the same rules and failures as the interpreter.
const COERCE_HELPER: &[(usize, &str)] = &[
    (0, "def _coerce(value, output_type):"),
    (1, "if output_type == 'string':"),
    (2, "if isinstance(value, (dict, list)):"),
    (3, "return json.dumps(value, separators=(',', ':'))"),
    (2, "return value if isinstance(value, str) else _fmt(value)"),
    (1, "if output_type == 'json':"),
    (2, "return json.loads(value) if isinstance(value, str) else value"),
    (1, "if isinstance(value, str):"),
    (2, "text = value.strip()"),
    (2, "if output_type == 'bool':"),
    (3, "if text.lower() in ('true', 'yes', 'y', 't', '1'):"),
    (4, "return True"),
    (3, "if text.lower() in ('false', 'no', 'n', 'f', '0'):"),
    (4, "return False"),
    (2, "else:"),
    (3, "try:"),
    (4, "return _coerce(int(text), output_type)"),
    (3, "except ValueError:"),
    (4, "pass"),
    (3, "try:"),
    (4, "return _coerce(float(text), output_type)"),
    (3, "except ValueError:"),
    (4, "pass"),
    (1, "elif isinstance(value, bool):"),
    (2, "if output_type == 'bool':"),
    (3, "return value"),
    (1, "elif isinstance(value, int):"),
    (2, "if output_type == 'bool':"),
    (3, "return value != 0"),
    (2, "return float(value) if output_type == 'float' else value"),
    (1, "elif isinstance(value, float):"),
    (2, "if output_type in ('number', 'float'):"),
    (3, "return value"),
    (2, "if output_type == 'int' and math.isfinite(value):"),
    (3, "return int(value)"),
    (1, "raise ValueError(f\"Cannot convert '{_fmt(value)}' to output type '{output_type}'\")"),
];

/// The outcome of a compilation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationResult {
    pub success: bool,
    /// Python source. Empty when compilation failed.
    pub code: String,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

/// A generated sub-workflow function.
#[derive(Debug, Clone)]
struct Helper {
    name: String,
    params: Vec<Param>,
    returns: OutputType,
}

/// State shared by every function generated in one compilation.
pub(super) struct Session {
    resolver: Option<Arc<dyn SubworkflowResolver>>,
    indent: usize,
    globals: NameTable,
    /// Workflow id to generated function, memoised.
    helpers: AHashMap<String, Helper>,
    /// Workflows whose function is being generated right now.
    in_progress: AHashSet<String>,
    helper_code: Vec<String>,
    prelude: Prelude,
    warnings: Vec<String>,
}

impl Session {
    fn new(resolver: Option<Arc<dyn SubworkflowResolver>>, indent: usize) -> Self {
        let mut globals = NameTable::default();
        for reserved in ["_fmt", "_date", "_coerce"] {
            globals.reserve(reserved);
        }
        Self {
            resolver,
            indent,
            globals,
            helpers: AHashMap::new(),
            in_progress: AHashSet::new(),
            helper_code: Vec::new(),
            prelude: Prelude::default(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        warn!(%message, "Compiler fallback emitted");
        self.warnings.push(message);
    }

    /// The helper for a sub-workflow, generating it on first use.
    fn helper_for(&mut self, subworkflow_id: &str) -> Result<Helper, String> {
        if let Some(helper) = self.helpers.get(subworkflow_id).cloned() {
            if self.in_progress.contains(subworkflow_id) {
                self.warn(format!(
                    "sub-workflow '{subworkflow_id}' is referenced cyclically; the call reuses '{}'",
                    helper.name
                ));
            }
            return Ok(helper);
        }

        let resolver = self
            .resolver
            .clone()
            .ok_or_else(|| "no sub-workflow resolver is configured".to_string())?;
        let workflow = resolver
            .resolve(subworkflow_id)
            .ok_or_else(|| format!("sub-workflow '{subworkflow_id}' could not be resolved"))?;

        let title = if workflow.name.trim().is_empty() {
            &workflow.id
        } else {
            &workflow.name
        };
        let name = self
            .globals
            .claim_identifier(format!("_subflow_{}", to_identifier(title)));
        let mut locals = NameTable::default();
        let params = parameters(&workflow, &mut locals);
        let helper = Helper {
            name: name.clone(),
            params: params.clone(),
            returns: workflow.effective_output_type(),
        };

        self.helpers.insert(subworkflow_id.to_string(), helper.clone());
        self.in_progress.insert(subworkflow_id.to_string());
        let code = FunctionEmitter::new(self, &workflow, name, locals, params).emit();
        self.in_progress.remove(subworkflow_id);

        match code {
            Ok(code) => {
                self.helper_code.push(code);
                Ok(helper)
            }
            Err(e) => {
                self.helpers.remove(subworkflow_id);
                Err(format!("sub-workflow '{subworkflow_id}' cannot be compiled: {e}"))
            }
        }
    }

    fn runtime_helper(&self, lines: &[(usize, &str)]) -> String {
        let mut writer = CodeWriter::new(self.indent);
        for (depth, text) in lines {
            writer.line(format!("{}{text}", " ".repeat(depth * self.indent)));
        }
        writer.finish()
    }

    /// Imports, then the runtime helpers, then sub-workflow helpers, then the main function.
    fn assemble(&self, main: &str) -> String {
        let mut sections = Vec::new();
        let imports: Vec<&str> = self.prelude.imports().collect();
        if !imports.is_empty() {
            sections.push(format!("{}\n", imports.join("\n")));
        }
        if self.prelude.needs_fmt {
            sections.push(self.runtime_helper(FMT_HELPER));
        }
        if self.prelude.needs_date {
            sections.push(self.runtime_helper(DATE_HELPER));
        }
        if self.prelude.needs_coerce {
            sections.push(self.runtime_helper(COERCE_HELPER));
        }
        sections.extend(self.helper_code.iter().cloned());
        sections.push(main.to_string());
        sections.join("\n\n")
    }
}

/// Generates Python source for a workflow.
pub struct SourceCompiler<'w> {
    workflow: &'w Workflow,
    resolver: Option<Arc<dyn SubworkflowResolver>>,
    function_name: Option<String>,
    indent: usize,
}

pub struct SourceCompilerBuilder<'w> {
    workflow: &'w Workflow,
    resolver: Option<Arc<dyn SubworkflowResolver>>,
    function_name: Option<String>,
    indent: usize,
}

impl<'w> SourceCompilerBuilder<'w> {
    pub fn new(workflow: &'w Workflow) -> Self {
        Self {
            workflow,
            resolver: None,
            function_name: None,
            indent: DEFAULT_INDENT,
        }
    }

    /// Resolver used to generate helpers for subprocess nodes.
    pub fn with_resolver<R: SubworkflowResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_shared_resolver(mut self, resolver: Arc<dyn SubworkflowResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Name of the generated entry point. Defaults to the workflow name as an identifier.
    pub fn with_function_name(mut self, name: &str) -> Self {
        self.function_name = Some(name.to_string());
        self
    }

    /// Spaces per indentation level. Zero is treated as one.
    pub fn with_indent(mut self, width: usize) -> Self {
        self.indent = width.max(1);
        self
    }

    pub fn build(self) -> SourceCompiler<'w> {
        SourceCompiler {
            workflow: self.workflow,
            resolver: self.resolver,
            function_name: self.function_name,
            indent: self.indent,
        }
    }
}

impl<'w> SourceCompiler<'w> {
    pub fn builder(workflow: &'w Workflow) -> SourceCompilerBuilder<'w> {
        SourceCompilerBuilder::new(workflow)
    }

    pub fn compile(&self) -> CompilationResult {
        match self.try_compile() {
            Ok((code, warnings)) => {
                info!(
                    workflow_id = %self.workflow.id,
                    lines = code.lines().count(),
                    warnings = warnings.len(),
                    "Compiled workflow to Python"
                );
                CompilationResult {
                    success: true,
                    code,
                    error: None,
                    warnings,
                }
            }
            Err(e) => {
                warn!(workflow_id = %self.workflow.id, error = %e, "Compilation failed");
                CompilationResult {
                    success: false,
                    code: String::new(),
                    error: Some(e.to_string()),
                    warnings: Vec::new(),
                }
            }
        }
    }

    fn try_compile(&self) -> Result<(String, Vec<String>), CompileError> {
        let workflow = self.workflow;
        let mut session = Session::new(self.resolver.clone(), self.indent);

        let requested = match &self.function_name {
            Some(name) => to_identifier(name),
            None if workflow.name.trim().is_empty() => DEFAULT_FUNCTION_NAME.to_string(),
            None => to_identifier(&workflow.name),
        };
        let name = session.globals.claim_identifier(requested);

        let mut locals = NameTable::default();
        let params = parameters(workflow, &mut locals);
        session.helpers.insert(
            workflow.id.clone(),
            Helper {
                name: name.clone(),
                params: params.clone(),
                returns: workflow.effective_output_type(),
            },
        );
        session.in_progress.insert(workflow.id.clone());

        let main = FunctionEmitter::new(&mut session, workflow, name, locals, params).emit()?;
        let code = session.assemble(&main);
        Ok((code, session.warnings))
    }
}
