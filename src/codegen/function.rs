use super::Session;
use super::expressions::{
    SourceKind, cast, conversion_failure, lower_calculation, lower_condition, lower_expression,
    never_converts, output_annotation, py_literal, py_number, py_string,
};
use super::naming::NameTable;
use super::writer::CodeWriter;
use crate::ast::Value;
use crate::error::CompileError;
use crate::workflow::template::{self, Segment};
use crate::workflow::{
    Calculation, CalculationOperator, DecisionBranches, DecisionCondition, Node, NodeKind,
    Operand, OutputSpec, OutputType, SubprocessCall, SuccessorIndex, Variable, VariableType,
    Workflow, resolve_branches, slugify,
};
use ahash::{AHashMap, AHashSet};

/// One parameter of a generated function.
#[derive(Debug, Clone)]
pub(super) struct Param {
    pub variable_id: String,
    pub variable_name: String,
    pub ident: String,
    pub annotation: &'static str,
    pub description: String,
}

/// Parameters for the input variables of `workflow`, in declaration order.
pub(super) fn parameters(workflow: &Workflow, locals: &mut NameTable) -> Vec<Param> {
    workflow
        .input_variables()
        .map(|variable| Param {
            variable_id: variable.id.clone(),
            variable_name: variable.name.clone(),
            ident: locals.claim(&variable.name),
            annotation: variable_annotation(variable.var_type),
            description: describe_variable(variable),
        })
        .collect()
}

fn variable_annotation(var_type: VariableType) -> &'static str {
    match var_type {
        VariableType::Int => "int",
        VariableType::Float => "float",
        VariableType::Bool => "bool",
        VariableType::String | VariableType::Enum | VariableType::Date => "str",
    }
}

fn describe_variable(variable: &Variable) -> String {
    let mut description = variable.name.clone();
    if let Some(range) = &variable.range {
        match (range.min, range.max) {
            (Some(min), Some(max)) => {
                description.push_str(&format!(", {} to {}", py_number(min), py_number(max)))
            }
            (Some(min), None) => description.push_str(&format!(", at least {}", py_number(min))),
            (None, Some(max)) => description.push_str(&format!(", at most {}", py_number(max))),
            (None, None) => {}
        }
    }
    if let Some(values) = variable.enum_values.as_ref().filter(|v| !v.is_empty()) {
        description.push_str(&format!(", one of: {}", values.join(", ")));
    }
    if variable.var_type == VariableType::Date {
        description.push_str(", ISO-8601 date");
    }
    description
}

/// Emits the Python function for one workflow.
pub(super) struct FunctionEmitter<'s, 'w> {
    session: &'s mut Session,
    workflow: &'w Workflow,
    name: String,
    successors: SuccessorIndex<'w>,
    params: Vec<Param>,
    locals: NameTable,
    /// Variable id to Python identifier.
    bindings: AHashMap<String, String>,
    /// Python identifier to what it holds.
    kinds: AHashMap<String, SourceKind>,
    derived: Vec<Variable>,
    on_path: AHashSet<&'w str>,
    writer: CodeWriter,
}

impl<'s, 'w> FunctionEmitter<'s, 'w> {
    pub fn new(
        session: &'s mut Session,
        workflow: &'w Workflow,
        name: String,
        mut locals: NameTable,
        params: Vec<Param>,
    ) -> Self {
        let mut bindings: AHashMap<String, String> = params
            .iter()
            .map(|p| (p.variable_id.clone(), p.ident.clone()))
            .collect();
        let mut kinds: AHashMap<String, SourceKind> = workflow
            .input_variables()
            .filter_map(|v| {
                let ident = bindings.get(&v.id)?;
                Some((ident.clone(), SourceKind::of_variable(v.var_type)))
            })
            .collect();
        let derived = workflow.derived_variables();
        for variable in &derived {
            if !bindings.contains_key(&variable.id) {
                bindings.insert(variable.id.clone(), locals.claim(&variable.id));
            }
        }
        for node in &workflow.nodes {
            let (id, kind) = match &node.kind {
                NodeKind::Calculation(calculation) => (calculation.derived_id(), SourceKind::Float),
                // Refined once the helper's return type is known.
                NodeKind::Subprocess(call) => (call.output_variable.clone(), SourceKind::Unknown),
                _ => continue,
            };
            if let Some(ident) = bindings.get(&id) {
                kinds.entry(ident.clone()).or_insert(kind);
            }
        }
        let writer = CodeWriter::new(session.indent);

        Self {
            session,
            workflow,
            name,
            successors: workflow.successor_index(),
            params,
            locals,
            bindings,
            kinds,
            derived,
            on_path: AHashSet::new(),
            writer,
        }
    }

    pub fn emit(mut self) -> Result<String, CompileError> {
        let workflow = self.workflow;
        if workflow.nodes.is_empty() {
            return Err(CompileError::NoNodes(workflow.id.clone()));
        }
        let start = workflow
            .start_node()
            .ok_or_else(|| CompileError::MissingStartNode(workflow.id.clone()))?;

        self.emit_signature();
        self.writer.indent();
        self.emit_docstring();
        self.visit(&start.id);
        self.writer.dedent();
        Ok(self.writer.finish())
    }

    fn emit_signature(&mut self) {
        let workflow = self.workflow;
        let title = if workflow.name.trim().is_empty() {
            &workflow.id
        } else {
            &workflow.name
        };
        self.writer.line(format!("# Workflow: {title} ({})", workflow.id));

        let params = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.ident, p.annotation))
            .collect::<Vec<_>>()
            .join(", ");
        let returns = output_annotation(workflow.effective_output_type());
        self.writer
            .line(format!("def {}({params}) -> {returns}:", self.name));
    }

    fn emit_docstring(&mut self) {
        let workflow = self.workflow;
        let title = if workflow.name.trim().is_empty() {
            workflow.id.clone()
        } else {
            workflow.name.clone()
        };
        self.writer
            .line(format!("\"\"\"{}.", title.replace("\"\"\"", "'''")));

        if !self.params.is_empty() {
            self.writer.blank();
            self.writer.line("Args:");
            self.writer.indent();
            for param in &self.params {
                self.writer.line(format!(
                    "{} ({}): {}",
                    param.ident,
                    param.annotation,
                    param.description.replace("\"\"\"", "'''")
                ));
            }
            self.writer.dedent();
        }

        let output_type = workflow.effective_output_type();
        self.writer.blank();
        self.writer.line("Returns:");
        self.writer.indent();
        self.writer.line(format!(
            "{}: The workflow output ({output_type}).",
            output_annotation(output_type)
        ));
        self.writer.dedent();
        self.writer.line("\"\"\"");
    }

    /// Emits the path starting at `node_id`. Straight runs of nodes are walked
    /// in a loop; only two-way decisions nest.
    fn visit(&mut self, node_id: &'w str) {
        let mut entered = Vec::new();
        let mut current = node_id;

        loop {
            let Some(node) = self.workflow.node(current) else {
                self.fallback_return(format!("edge points to missing node '{current}'"));
                break;
            };
            if self.on_path.contains(current) {
                self.fallback_return(format!("cycle back to node '{current}'; revisit skipped"));
                break;
            }
            self.on_path.insert(current);
            entered.push(current);

            match &node.kind {
                NodeKind::Start => {}
                NodeKind::Calculation(calculation) => self.emit_calculation(node, calculation),
                NodeKind::Subprocess(call) => self.emit_subprocess(node, call),
                NodeKind::Decision(condition) => match self.emit_decision(node, condition) {
                    Some(only) => {
                        current = only;
                        continue;
                    }
                    None => break,
                },
                NodeKind::End(spec) => {
                    self.emit_return(node, spec);
                    break;
                }
            }

            match self.successors.of(&node.id).first().map(|s| s.target) {
                Some(target) => current = target,
                None => {
                    self.fallback_return(format!(
                        "path ends at node '{}' without producing an output",
                        node.id
                    ));
                    break;
                }
            }
        }

        for id in entered {
            self.on_path.remove(id);
        }
    }

    /// Emits a decision. A single-branch decision emits no test and returns
    /// the node its path continues with.
    fn emit_decision(&mut self, node: &'w Node, condition: &DecisionCondition) -> Option<&'w str> {
        let test = match condition {
            DecisionCondition::Structured(structured) => {
                match self.bindings.get(&structured.input_id).cloned() {
                    Some(var) => lower_condition(structured, &var, &mut self.session.prelude),
                    None => Err(format!("unknown variable '{}'", structured.input_id)),
                }
            }
            DecisionCondition::Expression { expression, .. } => {
                lower_expression(expression, &|name: &str| self.resolve_named(name))
            }
            DecisionCondition::Invalid { error, .. } => Err(format!("condition does not parse: {error}")),
        };
        let test = match test {
            Ok(test) => test,
            Err(reason) => {
                self.warn(format!("decision '{}' has no usable condition: {reason}", node.id));
                "False".to_string()
            }
        };

        let children: Vec<(Option<&'w str>, &'w str)> = self
            .successors
            .of(&node.id)
            .iter()
            .map(|s| (s.label, s.target))
            .collect();
        match resolve_branches(&children) {
            Ok(DecisionBranches::Unconditional(target)) => {
                self.writer.line(format!("# {test}: single branch"));
                return Some(target);
            }
            Ok(DecisionBranches::Conditional {
                on_true, on_false, ..
            }) => {
                self.writer.line(format!("if {test}:"));
                self.writer.indent();
                self.visit(on_true);
                self.writer.dedent();
                self.writer.line("else:");
                self.writer.indent();
                self.visit(on_false);
                self.writer.dedent();
            }
            Err(e) => self.fallback_return(format!("decision '{}': {e}", node.id)),
        }
        None
    }

    fn emit_calculation(&mut self, node: &Node, calculation: &Calculation) {
        let target = self.binding(&calculation.derived_id());

        let Some(operator) = CalculationOperator::parse(&calculation.operator) else {
            self.warn(format!(
                "calculation '{}' uses unknown operator '{}'",
                node.id, calculation.operator
            ));
            self.writer.line(format!("{target} = None"));
            return;
        };
        if let Err(e) = operator.check_arity(calculation.operands.len()) {
            self.warn(format!("calculation '{}': {e}", node.id));
            self.writer.line(format!("{target} = None"));
            return;
        }

        let operands: Result<Vec<String>, String> = calculation
            .operands
            .iter()
            .map(|operand| match operand {
                Operand::Literal { value } => match value {
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    other => other.as_f64(),
                }
                .map(py_number)
                .ok_or_else(|| format!("operand '{value}' is not a number")),
                Operand::Variable { reference } => self
                    .resolve(reference)
                    .ok_or_else(|| format!("unknown variable '{reference}'")),
            })
            .collect();

        match operands {
            Ok(operands) => {
                let expr = lower_calculation(operator, &operands, &mut self.session.prelude);
                self.writer.line(format!("{target} = float({expr})"));
            }
            Err(reason) => {
                self.warn(format!("calculation '{}': {reason}", node.id));
                self.writer.line(format!("{target} = None"));
            }
        }
    }

    fn emit_subprocess(&mut self, node: &Node, call: &SubprocessCall) {
        let target = self.binding(&call.output_variable);
        let helper = match self.session.helper_for(&call.subworkflow_id) {
            Ok(helper) => helper,
            Err(reason) => {
                self.warn(format!("subprocess '{}': {reason}", node.id));
                self.writer.line(format!("{target} = None"));
                self.kinds.insert(target, SourceKind::Unknown);
                return;
            }
        };

        let mut arguments = Vec::new();
        for (parent_variable, sub_input) in &call.input_mapping {
            let Some(param) = helper
                .params
                .iter()
                .find(|p| &p.variable_id == sub_input || &p.variable_name == sub_input)
            else {
                self.warn(format!(
                    "subprocess '{}' maps '{parent_variable}' to unknown input '{sub_input}'",
                    node.id
                ));
                continue;
            };
            let value = match self.resolve(parent_variable) {
                Some(value) => value,
                None => {
                    self.warn(format!(
                        "subprocess '{}' maps unknown variable '{parent_variable}'",
                        node.id
                    ));
                    "None".to_string()
                }
            };
            arguments.push(format!("{}={value}", param.ident));
        }

        let call_expr = format!("{}({})", helper.name, arguments.join(", "));
        let returned = SourceKind::of_output(helper.returns);
        let (expr, kind) = match call.output_type {
            Some(output_type) => {
                if never_converts(output_type, returned) {
                    let reason = conversion_failure(output_type, returned);
                    self.fallback_raise(format!("subprocess '{}': {reason}", node.id));
                    return;
                }
                let expr = cast(output_type, &call_expr, returned, &mut self.session.prelude);
                (expr, SourceKind::of_output(output_type))
            }
            None => (call_expr, returned),
        };
        self.writer.line(format!("{target} = {expr}"));
        self.kinds.insert(target, kind);
    }

    fn emit_return(&mut self, node: &Node, spec: &OutputSpec) {
        let output_type = spec.output_type;
        let expr = match (spec.template(), &spec.output_value) {
            (Some(template), _) => self.lower_template(template, output_type),
            (None, Some(value)) => literal_output(value.clone(), output_type),
            (None, None) => self.lower_template(&node.label, output_type),
        };
        // Conversion failures are runtime errors in the interpreter too.
        match expr {
            Ok(expr) => self.writer.line(format!("return {expr}")),
            Err(reason) => self.fallback_raise(format!("end node '{}': {reason}", node.id)),
        }
    }

    fn lower_template(&mut self, text: &str, output_type: OutputType) -> Result<String, String> {
        let raw = match output_type {
            OutputType::String => None,
            _ => template::single_placeholder(text).and_then(|name| self.resolve(name)),
        };
        if let Some(ident) = raw {
            let kind = self.kinds.get(&ident).copied().unwrap_or(SourceKind::Unknown);
            if never_converts(output_type, kind) {
                return Err(format!("'{ident}': {}", conversion_failure(output_type, kind)));
            }
            return Ok(cast(output_type, &ident, kind, &mut self.session.prelude));
        }

        let segments = template::segments(text);
        if !segments.iter().any(|s| matches!(s, Segment::Placeholder(_))) {
            return literal_output(Value::String(text.to_string()), output_type);
        }

        let mut body = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => body.push_str(&fstring_text(text)),
                Segment::Placeholder(name) => match self.resolve(name) {
                    Some(ident) => {
                        self.session.prelude.needs_fmt = true;
                        body.push_str(&format!("{{_fmt({ident})}}"));
                    }
                    None => {
                        self.warn(format!("output placeholder '{{{name}}}' does not name a variable"));
                        body.push_str(&fstring_text(&format!("{{{name}}}")));
                    }
                },
            }
        }
        let fstring = format!("f'{body}'");
        Ok(cast(output_type, &fstring, SourceKind::Text, &mut self.session.prelude))
    }

    /// Python identifier bound to a variable id, claiming one if needed.
    fn binding(&mut self, id: &str) -> String {
        if let Some(ident) = self.bindings.get(id) {
            return ident.clone();
        }
        let ident = self.locals.claim(id);
        self.bindings.insert(id.to_string(), ident.clone());
        ident
    }

    /// Resolves a key by variable id, then display name.
    fn resolve_named(&self, key: &str) -> Option<String> {
        self.bindings.get(key).cloned().or_else(|| {
            self.workflow
                .variables
                .iter()
                .chain(self.derived.iter())
                .find(|v| v.name == key)
                .and_then(|v| self.bindings.get(&v.id).cloned())
        })
    }

    /// Resolves a key by variable id, then display name, then slugified name.
    fn resolve(&self, key: &str) -> Option<String> {
        self.resolve_named(key)
            .or_else(|| self.bindings.get(&slugify(key)).cloned())
    }

    fn warn(&mut self, message: String) {
        self.writer.line(format!("# WARNING: {message}"));
        self.session.warn(message);
    }

    fn fallback_return(&mut self, message: String) {
        self.warn(message);
        self.writer.line("return None");
    }

    fn fallback_raise(&mut self, message: String) {
        let raised = format!("raise ValueError({})", py_string(&message));
        self.warn(message);
        self.writer.line(raised);
    }
}

/// Coerces a constant output at compile time and prints it as a Python literal.
fn literal_output(value: Value, output_type: OutputType) -> Result<String, String> {
    output_type
        .coerce(value)
        .map(|coerced| py_literal(&coerced))
        .map_err(|e| e.to_string())
}

/// Escapes literal text for the inside of a single-quoted f-string.
fn fstring_text(text: &str) -> String {
    let quoted = py_string(text);
    quoted[1..quoted.len() - 1]
        .replace('{', "{{")
        .replace('}', "}}")
}
