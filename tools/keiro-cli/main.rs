use clap::{Parser, Subcommand};
use keiro::codegen::SourceCompiler;
use keiro::data::{InputFile, WorkflowLibrary};
use keiro::interpreter::{InputValues, Interpreter};
use keiro::resolver::InMemoryResolver;
use keiro::validator::{PrepareError, ValidationMode, Validator, format_validation_errors};
use keiro::workflow::{Workflow, WorkflowDocument};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Validate, run and compile decision workflows
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a workflow document and list every problem found
    Validate {
        /// Path to the workflow JSON file
        workflow_path: PathBuf,

        /// Only run the rules that apply while a workflow is being edited
        #[arg(long)]
        lenient: bool,
    },

    /// Execute a workflow against a set of input values
    Run {
        /// Path to the workflow JSON file
        workflow_path: PathBuf,

        /// JSON object of input values keyed by variable id or name
        #[arg(short, long)]
        inputs: Option<PathBuf>,

        /// Directory of workflow files used to resolve subprocess nodes
        #[arg(short, long)]
        subflows: Option<PathBuf>,
    },

    /// Generate a Python function equivalent to the workflow
    Compile {
        /// Path to the workflow JSON file
        workflow_path: PathBuf,

        /// Directory of workflow files used to resolve subprocess nodes
        #[arg(short, long)]
        subflows: Option<PathBuf>,

        /// Write the generated source here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Name of the generated function
        #[arg(long)]
        function_name: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate {
            workflow_path,
            lenient,
        } => run_validate(&workflow_path, lenient),
        Command::Run {
            workflow_path,
            inputs,
            subflows,
        } => run_execute(&workflow_path, inputs.as_deref(), subflows.as_deref()),
        Command::Compile {
            workflow_path,
            subflows,
            out,
            function_name,
        } => run_compile(
            &workflow_path,
            subflows.as_deref(),
            out.as_deref(),
            function_name.as_deref(),
        ),
    }
}

fn run_validate(workflow_path: &Path, lenient: bool) {
    let document = load_document(workflow_path);
    let mode = if lenient {
        ValidationMode::Lenient
    } else {
        ValidationMode::Strict
    };

    let report = Validator::new(mode).validate(&document);
    let errors: Vec<_> = report.errors.iter().filter(|e| e.is_error()).cloned().collect();
    let warnings: Vec<_> = report.warnings().cloned().collect();

    if !warnings.is_empty() {
        println!("Warnings:\n{}\n", format_validation_errors(&warnings));
    }
    if errors.is_empty() {
        println!("Workflow is valid ({:?} mode).", mode);
    } else {
        println!("Workflow is invalid:\n{}", format_validation_errors(&errors));
        std::process::exit(1);
    }
}

fn run_execute(workflow_path: &Path, inputs_path: Option<&Path>, subflows: Option<&Path>) {
    let total_start = Instant::now();
    let workflow = prepare(workflow_path);

    let inputs = match inputs_path {
        Some(path) => InputFile::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load inputs: {}", e)))
            .into_values(),
        None => {
            println!("No inputs file provided. Running with no input values.");
            InputValues::new()
        }
    };

    let mut builder = Interpreter::builder();
    if let Some(resolver) = load_library(subflows) {
        builder = builder.with_resolver(resolver);
    }

    let eval_start = Instant::now();
    let result = builder.build().execute(&workflow, &inputs);
    let eval_duration = eval_start.elapsed();

    let rendered = serde_json::to_string_pretty(&result)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to render result: {}", e)));
    println!("{}", rendered);

    println!("\n--- Performance Summary ---");
    println!("Execution:            {:?}", eval_duration);
    println!("Total:                {:?}", total_start.elapsed());

    if !result.success && !result.stopped {
        std::process::exit(1);
    }
}

fn run_compile(
    workflow_path: &Path,
    subflows: Option<&Path>,
    out: Option<&Path>,
    function_name: Option<&str>,
) {
    let workflow = prepare(workflow_path);

    let mut builder = SourceCompiler::builder(&workflow);
    if let Some(resolver) = load_library(subflows) {
        builder = builder.with_resolver(resolver);
    }
    if let Some(name) = function_name {
        builder = builder.with_function_name(name);
    }

    let result = builder.build().compile();
    if !result.success {
        exit_with_error(&format!(
            "Compilation failed: {}",
            result.error.unwrap_or_default()
        ));
    }
    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }

    match out {
        Some(path) => {
            fs::write(path, &result.code).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to write '{}': {}", path.display(), e))
            });
            println!("Wrote {} ({} lines)", path.display(), result.code.lines().count());
        }
        None => print!("{}", result.code),
    }
}

fn load_document(path: &Path) -> WorkflowDocument {
    WorkflowDocument::from_file(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load workflow: {}", e)))
}

/// Strict validation followed by conversion; exits with the findings on failure.
fn prepare(path: &Path) -> Workflow {
    let document = load_document(path);
    match Validator::new(ValidationMode::Strict).prepare(&document) {
        Ok(workflow) => workflow,
        Err(PrepareError::Invalid(errors)) => exit_with_error(&format!(
            "Workflow '{}' is invalid:\n{}",
            path.display(),
            format_validation_errors(&errors)
        )),
        Err(e) => exit_with_error(&e.to_string()),
    }
}

fn load_library(dir: Option<&Path>) -> Option<InMemoryResolver> {
    let dir = dir?;
    let library = WorkflowLibrary::from_dir(dir).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to load sub-workflows: {}", e))
    });
    for skipped in library.skipped() {
        eprintln!("Skipped '{}': not a workflow", skipped.display());
    }
    Some(library.into_resolver())
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
