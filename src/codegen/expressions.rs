//! Lowering of conditions, calculations and literals to Python expressions.

use crate::ast::value::format_number;
use crate::ast::{BinaryOperator, Expression, UnaryOperator, Value};
use crate::workflow::{
    CalculationOperator, Comparator, ComparatorFamily, Condition, OutputType, TextMatch,
    VariableType,
};
use itertools::Itertools;
use std::collections::BTreeSet;

pub(super) const IMPORT_MATH: &str = "import math";
pub(super) const IMPORT_STATISTICS: &str = "import statistics";
pub(super) const IMPORT_JSON: &str = "import json";
pub(super) const IMPORT_DATETIME: &str = "from datetime import datetime, timezone";

/// Module imports and helpers the generated code depends on.
#[derive(Debug, Default)]
pub(super) struct Prelude {
    imports: BTreeSet<&'static str>,
    pub needs_fmt: bool,
    pub needs_date: bool,
    pub needs_coerce: bool,
}

impl Prelude {
    pub fn import(&mut self, line: &'static str) {
        self.imports.insert(line);
    }

    fn use_date(&mut self) {
        self.import(IMPORT_DATETIME);
        self.needs_date = true;
    }

    /// Runtime conversion with the interpreter's rules; raises `ValueError` on failure.
    fn coerce_call(&mut self, output_type: OutputType, expr: &str) -> String {
        self.import(IMPORT_JSON);
        self.import(IMPORT_MATH);
        self.needs_fmt = true;
        self.needs_coerce = true;
        format!("_coerce({expr}, {})", py_string(output_type.as_str()))
    }

    pub fn imports(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.imports.iter().copied()
    }
}

/// Single-quoted Python string literal.
pub(super) fn py_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// A number as written in a comparison; integral values print without a fraction.
pub(super) fn py_number(n: f64) -> String {
    if n.is_nan() {
        "float('nan')".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "float('inf')" } else { "-float('inf')" }.to_string()
    } else {
        format_number(n)
    }
}

fn py_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}.0", n as i64)
    } else {
        py_number(n)
    }
}

pub(super) fn py_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => py_float(*f),
        Value::String(s) => py_string(s),
        Value::Json(json) => py_json(json),
    }
}

fn py_json(json: &serde_json::Value) -> String {
    match json {
        serde_json::Value::Null => "None".to_string(),
        serde_json::Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) => py_float(f),
            (None, None) => n.to_string(),
        },
        serde_json::Value::String(s) => py_string(s),
        serde_json::Value::Array(items) => format!("[{}]", items.iter().map(py_json).join(", ")),
        serde_json::Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(key, value)| format!("{}: {}", py_string(key), py_json(value)))
                .join(", ")
        ),
    }
}

/// Python type annotation for values of an output type.
pub(super) fn output_annotation(output_type: OutputType) -> &'static str {
    match output_type {
        OutputType::String => "str",
        OutputType::Number | OutputType::Float => "float",
        OutputType::Int => "int",
        OutputType::Bool => "bool",
        OutputType::Json => "object",
    }
}

/// What a Python expression is statically known to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SourceKind {
    Text,
    Int,
    Float,
    /// An int or a float.
    Number,
    Bool,
    Unknown,
}

impl SourceKind {
    pub fn of_variable(var_type: VariableType) -> Self {
        match var_type {
            VariableType::Int => SourceKind::Int,
            VariableType::Float => SourceKind::Float,
            VariableType::Bool => SourceKind::Bool,
            VariableType::String | VariableType::Enum | VariableType::Date => SourceKind::Text,
        }
    }

    /// Kind of a value already converted to `output_type`.
    pub fn of_output(output_type: OutputType) -> Self {
        match output_type {
            OutputType::String => SourceKind::Text,
            OutputType::Number => SourceKind::Number,
            OutputType::Int => SourceKind::Int,
            OutputType::Float => SourceKind::Float,
            OutputType::Bool => SourceKind::Bool,
            OutputType::Json => SourceKind::Unknown,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            SourceKind::Text => "string",
            SourceKind::Int => "int",
            SourceKind::Float => "float",
            SourceKind::Number => "number",
            SourceKind::Bool => "bool",
            SourceKind::Unknown => "untyped",
        }
    }
}

/// True when converting a `source` value to `output_type` fails for every input.
pub(super) fn never_converts(output_type: OutputType, source: SourceKind) -> bool {
    matches!(
        (output_type, source),
        (OutputType::Number | OutputType::Int | OutputType::Float, SourceKind::Bool)
            | (OutputType::Bool, SourceKind::Float)
    )
}

/// Message for a conversion that [`never_converts`].
pub(super) fn conversion_failure(output_type: OutputType, source: SourceKind) -> String {
    format!(
        "a {} value cannot be converted to output type '{output_type}'",
        source.describe()
    )
}

/// Wraps `expr`, holding a `source` value, so that it evaluates to
/// `output_type` exactly as the interpreter's coercion would.
///
/// Conversions that cannot be decided statically go through `_coerce`.
pub(super) fn cast(
    output_type: OutputType,
    expr: &str,
    source: SourceKind,
    prelude: &mut Prelude,
) -> String {
    use SourceKind as S;
    match (output_type, source) {
        (OutputType::String, S::Text)
        | (OutputType::Number, S::Int | S::Float | S::Number)
        | (OutputType::Int, S::Int)
        | (OutputType::Float, S::Float)
        | (OutputType::Bool, S::Bool)
        | (OutputType::Json, S::Int | S::Float | S::Number | S::Bool) => expr.to_string(),
        (OutputType::String, S::Int | S::Float | S::Number | S::Bool) => {
            prelude.needs_fmt = true;
            format!("_fmt({expr})")
        }
        (OutputType::Int, S::Float | S::Number) => format!("int({expr})"),
        (OutputType::Int, S::Text) => format!("int(float({expr}))"),
        (OutputType::Float, S::Int | S::Number | S::Text) => format!("float({expr})"),
        (OutputType::Bool, S::Int) => format!("{expr} != 0"),
        (OutputType::Json, S::Text) => {
            prelude.import(IMPORT_JSON);
            format!("json.loads({expr})")
        }
        _ => prelude.coerce_call(output_type, expr),
    }
}

/// Lowers a structured condition on the Python variable `var`.
///
/// `Err` carries the reason the condition cannot be compiled.
pub(super) fn lower_condition(
    condition: &Condition,
    var: &str,
    prelude: &mut Prelude,
) -> Result<String, String> {
    let comparator = Comparator::parse(&condition.comparator)
        .ok_or_else(|| format!("unknown comparator '{}'", condition.comparator))?;
    let second = || {
        condition
            .value2
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or_else(|| format!("comparator '{comparator}' requires a second value"))
    };

    match comparator.family() {
        ComparatorFamily::Numeric => {
            let number = |value: &Value| {
                value
                    .as_f64()
                    .map(py_number)
                    .ok_or_else(|| format!("'{value}' is not a number"))
            };
            let v1 = number(&condition.value)?;
            Ok(match comparator {
                Comparator::Eq => format!("{var} == {v1}"),
                Comparator::Neq => format!("{var} != {v1}"),
                Comparator::Lt => format!("{var} < {v1}"),
                Comparator::Lte => format!("{var} <= {v1}"),
                Comparator::Gt => format!("{var} > {v1}"),
                Comparator::Gte => format!("{var} >= {v1}"),
                _ => format!("{v1} <= {var} <= {}", number(second()?)?),
            })
        }
        ComparatorFamily::Boolean => Ok(match comparator {
            Comparator::IsTrue => var.to_string(),
            _ => format!("not {var}"),
        }),
        ComparatorFamily::String | ComparatorFamily::Enum => {
            let haystack = format!("str({var}).lower()");
            let needle = py_string(&text_of(&condition.value).to_lowercase());
            Ok(match comparator.text_match() {
                Some(TextMatch::Equals) => format!("{haystack} == {needle}"),
                Some(TextMatch::NotEquals) => format!("{haystack} != {needle}"),
                Some(TextMatch::Contains) => format!("{needle} in {haystack}"),
                Some(TextMatch::StartsWith) => format!("{haystack}.startswith({needle})"),
                Some(TextMatch::EndsWith) => format!("{haystack}.endswith({needle})"),
                None => return Err(format!("comparator '{comparator}' does not compare text")),
            })
        }
        ComparatorFamily::Date => {
            prelude.use_date();
            let date = |value: &Value| format!("_date({})", py_string(&text_of(value)));
            let x = format!("_date({var})");
            let v1 = date(&condition.value);
            Ok(match comparator {
                Comparator::DateEq => format!("{x} == {v1}"),
                Comparator::DateBefore => format!("{x} < {v1}"),
                Comparator::DateAfter => format!("{x} > {v1}"),
                _ => format!("{v1} <= {x} <= {}", date(second()?)),
            })
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lowers a free-text condition. `resolve` maps a variable name to its Python identifier.
pub(super) fn lower_expression<F>(expression: &Expression, resolve: &F) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    lower_with_precedence(expression, resolve, 0, false)
}

fn lower_with_precedence<F>(
    expression: &Expression,
    resolve: &F,
    parent: u8,
    is_right: bool,
) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let current = expression.precedence();
    let text = match expression {
        Expression::Binary { left, op, right } => {
            let op_text = match op {
                BinaryOperator::Or => "or",
                BinaryOperator::And => "and",
                other => other.symbol(),
            };
            format!(
                "{} {} {}",
                lower_with_precedence(left, resolve, current, false)?,
                op_text,
                lower_with_precedence(right, resolve, current, true)?
            )
        }
        Expression::Unary {
            op: UnaryOperator::Not,
            operand,
        } => format!("not {}", lower_with_precedence(operand, resolve, current, false)?),
        Expression::Variable(name) => {
            resolve(name).ok_or_else(|| format!("unknown variable '{name}'"))?
        }
        Expression::Literal(value) => py_literal(value),
    };

    // Comparisons never chain, so equal precedence also needs parentheses.
    let needs_parens = current < parent || (current == parent && (is_right || current == 4));
    Ok(if needs_parens {
        format!("({text})")
    } else {
        text
    })
}

/// Python expression for a calculation over already-lowered operands.
pub(super) fn lower_calculation(
    operator: CalculationOperator,
    operands: &[String],
    prelude: &mut Prelude,
) -> String {
    use CalculationOperator::*;
    let x = operands.first().map(String::as_str).unwrap_or("0");
    let y = operands.get(1).map(String::as_str).unwrap_or("0");
    let list = format!("[{}]", operands.join(", "));
    let math = |function: &str, prelude: &mut Prelude| {
        prelude.import(IMPORT_MATH);
        format!("math.{function}({})", operands.join(", "))
    };

    match operator {
        Add => format!("({})", operands.join(" + ")),
        Multiply => format!("({})", operands.join(" * ")),
        Subtract => format!("({x} - {y})"),
        Divide => format!("({x} / {y})"),
        Modulo => format!("({x} % {y})"),
        Power => format!("({x} ** {y})"),
        Abs => format!("abs({x})"),
        Negate => format!("(-{x})"),
        Round => format!("round({x})"),
        Sqrt => math("sqrt", prelude),
        Floor => math("floor", prelude),
        Ceil => math("ceil", prelude),
        Sin => math("sin", prelude),
        Cos => math("cos", prelude),
        Tan => math("tan", prelude),
        Asin => math("asin", prelude),
        Acos => math("acos", prelude),
        Atan => math("atan", prelude),
        Log => math("log", prelude),
        Log10 => math("log10", prelude),
        Exp => math("exp", prelude),
        Hypot => math("hypot", prelude),
        Min => format!("min({list})"),
        Max => format!("max({list})"),
        Range => format!("(max({list}) - min({list}))"),
        Average => format!("({}) / {}", operands.join(" + "), operands.len()),
        Median | Variance | StdDev | GeometricMean | HarmonicMean => {
            prelude.import(IMPORT_STATISTICS);
            let function = match operator {
                Median => "median",
                Variance => "pvariance",
                StdDev => "pstdev",
                GeometricMean => "geometric_mean",
                _ => "harmonic_mean",
            };
            format!("statistics.{function}({list})")
        }
    }
}
