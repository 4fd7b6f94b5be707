//! Unit tests for values, operators, branches, templates and loading.
mod common;
use common::*;
use keiro::codegen::to_identifier;
use keiro::error::{BranchError, CalculationError};
use keiro::prelude::*;
use keiro::workflow::template::{self, Segment};
use keiro::workflow::{
    BranchLabel, CalculationOperator, DecisionBranches, NodeKind, resolve_branches, slugify,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;

#[test]
fn test_value_display() {
    assert_eq!(Value::Float(25.0).to_string(), "25");
    assert_eq!(Value::Float(23.45).to_string(), "23.45");
    assert_eq!(Value::Int(-3).to_string(), "-3");
    assert_eq!(Value::Bool(true).to_string(), "true");
    assert_eq!(Value::Null.to_string(), "null");
    assert_eq!(Value::String("hi".into()).to_string(), "hi");
}

#[test]
fn test_value_from_json() {
    assert_eq!(Value::from(json!(3)), Value::Int(3));
    assert_eq!(Value::from(json!(2.5)), Value::Float(2.5));
    assert_eq!(Value::from(json!("x")), Value::String("x".into()));
    assert_eq!(Value::from(json!([1, 2])), Value::Json(json!([1, 2])));
    assert_eq!(Value::Bool(true).as_f64(), None);
}

#[test]
fn test_output_type_coercion() {
    assert_eq!(OutputType::Number.coerce(Value::String(" 4 ".into())), Ok(Value::Int(4)));
    assert_eq!(OutputType::Int.coerce(Value::Float(7.9)), Ok(Value::Int(7)));
    assert_eq!(OutputType::Float.coerce(Value::Int(2)), Ok(Value::Float(2.0)));
    assert_eq!(OutputType::Bool.coerce(Value::String("Yes".into())), Ok(Value::Bool(true)));
    assert_eq!(OutputType::String.coerce(Value::Float(1.0)), Ok(Value::String("1".into())));
    assert_eq!(
        OutputType::Json.coerce(Value::String(r#"{"a":1}"#.into())),
        Ok(Value::Json(json!({ "a": 1 })))
    );

    let error = OutputType::Bool.coerce(Value::String("maybe".into())).unwrap_err();
    assert_eq!(error.to_string(), "Cannot convert 'maybe' to output type 'bool'");
}

#[test]
fn test_output_type_parse_aliases() {
    assert_eq!(OutputType::parse("Integer"), Some(OutputType::Int));
    assert_eq!(OutputType::parse("boolean"), Some(OutputType::Bool));
    assert_eq!(OutputType::parse("object"), Some(OutputType::Json));
    assert_eq!(OutputType::parse("vector"), None);
}

fn apply(name: &str, operands: &[f64]) -> std::result::Result<f64, CalculationError> {
    CalculationOperator::parse(name).unwrap().apply(operands)
}

#[test]
fn test_arithmetic_operators() {
    assert_eq!(apply("add", &[1.0, 2.0, 3.5]), Ok(6.5));
    assert_eq!(apply("subtract", &[10.0, 4.0]), Ok(6.0));
    assert_eq!(apply("multiply", &[2.0, 3.0, 4.0]), Ok(24.0));
    assert_eq!(apply("divide", &[9.0, 2.0]), Ok(4.5));
    assert_eq!(apply("power", &[2.0, 10.0]), Ok(1024.0));
    assert_eq!(apply("negate", &[3.0]), Ok(-3.0));
    assert_eq!(apply("abs", &[-3.0]), Ok(3.0));
}

#[test]
fn test_modulo_takes_sign_of_divisor() {
    assert_eq!(apply("modulo", &[7.0, 3.0]), Ok(1.0));
    assert_eq!(apply("modulo", &[-7.0, 3.0]), Ok(2.0));
    assert_eq!(apply("modulo", &[7.0, -3.0]), Ok(-2.0));
}

#[test]
fn test_round_half_to_even() {
    assert_eq!(apply("round", &[2.5]), Ok(2.0));
    assert_eq!(apply("round", &[3.5]), Ok(4.0));
    assert_eq!(apply("round", &[-0.5]), Ok(-0.0));
    assert_eq!(apply("round", &[1.2]), Ok(1.0));
}

#[test]
fn test_statistical_operators() {
    let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    assert_eq!(apply("average", &data), Ok(5.0));
    assert_eq!(apply("median", &data), Ok(4.5));
    assert_eq!(apply("variance", &data), Ok(4.0));
    assert_eq!(apply("std_dev", &data), Ok(2.0));
    assert_eq!(apply("range", &data), Ok(7.0));
    assert_eq!(apply("min", &data), Ok(2.0));
    assert_eq!(apply("max", &data), Ok(9.0));
    assert_eq!(apply("median", &[3.0, 1.0, 2.0]), Ok(2.0));
    assert_eq!(apply("hypot", &[3.0, 4.0]), Ok(5.0));
    assert_eq!(apply("harmonic_mean", &[1.0, 0.0]), Ok(0.0));

    let geometric = apply("geometric_mean", &[2.0, 8.0]).unwrap();
    assert!((geometric - 4.0).abs() < 1e-12);
}

#[test]
fn test_operator_errors() {
    assert_eq!(
        apply("divide", &[1.0, 0.0]),
        Err(CalculationError::DivisionByZero("divide"))
    );
    assert_eq!(
        apply("sqrt", &[-4.0]),
        Err(CalculationError::Domain { operator: "sqrt", value: -4.0 })
    );
    assert!(matches!(apply("log", &[0.0]), Err(CalculationError::Domain { .. })));
    assert!(matches!(apply("asin", &[2.0]), Err(CalculationError::Domain { .. })));
    assert!(matches!(apply("geometric_mean", &[1.0, -1.0]), Err(CalculationError::Domain { .. })));

    let arity = apply("subtract", &[1.0]).unwrap_err();
    assert_eq!(arity.to_string(), "Operator 'subtract' expects exactly 2 operand(s), but received 1");
    assert!(matches!(apply("max", &[]), Err(CalculationError::Arity { .. })));
    assert_eq!(CalculationOperator::parse("teleport"), None);
}

#[test]
fn test_branch_labels() {
    assert_eq!(BranchLabel::classify(Some(" YES ")), BranchLabel::True);
    assert_eq!(BranchLabel::classify(Some("t")), BranchLabel::True);
    assert_eq!(BranchLabel::classify(Some("0")), BranchLabel::False);
    assert_eq!(BranchLabel::classify(Some("maybe")), BranchLabel::Unlabeled);
    assert_eq!(BranchLabel::classify(None), BranchLabel::Unlabeled);
}

#[test]
fn test_resolve_branches() {
    assert_eq!(resolve_branches::<u8>(&[]), Err(BranchError::NoChildren));
    assert_eq!(
        resolve_branches(&[(None, 1)]),
        Ok(DecisionBranches::Unconditional(1))
    );
    assert_eq!(
        resolve_branches(&[(Some("no"), 1), (Some("yes"), 2)]),
        Ok(DecisionBranches::Conditional { on_true: 2, on_false: 1, positional: false })
    );
    assert_eq!(
        resolve_branches(&[(None, 1), (None, 2)]),
        Ok(DecisionBranches::Conditional { on_true: 1, on_false: 2, positional: true })
    );
    assert_eq!(
        resolve_branches(&[(None, 1), (Some("yes"), 2)]),
        Ok(DecisionBranches::Conditional { on_true: 2, on_false: 1, positional: true })
    );
    assert_eq!(
        resolve_branches(&[(Some("yes"), 1), (None, 2), (Some("no"), 3)]),
        Ok(DecisionBranches::Conditional { on_true: 1, on_false: 3, positional: false })
    );
    assert_eq!(
        resolve_branches(&[(None, 1), (None, 2), (None, 3)]),
        Err(BranchError::Ambiguous { children: 3 })
    );
    assert_eq!(
        resolve_branches(&[(Some("yes"), 1), (Some("true"), 2)]),
        Err(BranchError::Ambiguous { children: 2 })
    );
}

#[test]
fn test_slugify_and_identifiers() {
    assert_eq!(slugify("Body Mass Index"), "body_mass_index");
    assert_eq!(slugify("  Total (EUR) "), "total_eur");
    assert_eq!(slugify("--"), "");

    assert_eq!(to_identifier("Body Mass Index"), "body_mass_index");
    assert_eq!(to_identifier("2nd dose"), "v_2nd_dose");
    assert_eq!(to_identifier("class"), "class_");
    assert_eq!(to_identifier("max"), "max_");
    assert_eq!(to_identifier("!!!"), "value");
}

#[test]
fn test_template_segments_and_render() {
    assert_eq!(
        template::segments("BMI is { bmi }!"),
        vec![Segment::Text("BMI is "), Segment::Placeholder("bmi"), Segment::Text("!")]
    );
    assert_eq!(template::placeholders("{a} and {b} and {a}"), vec!["a", "b", "a"]);
    assert_eq!(template::single_placeholder(" {total} "), Some("total"));
    assert_eq!(template::single_placeholder("Total {total}"), None);

    let rendered = template::render("{known} / {unknown}", |name| {
        (name == "known").then(|| "42".to_string())
    });
    assert_eq!(rendered, "42 / {unknown}");
}

#[test]
fn test_conversion_reads_camel_case_fields() {
    let workflow = workflow(json!({
        "id": "camel",
        "outputType": "int",
        "variables": [{ "id": "n", "name": "N", "type": "int" }],
        "nodes": [
            node("start", "START", "Start"),
            node_with("call", "subprocess", "Call", json!({
                "subworkflowId": "other",
                "inputMapping": { "n": "m" },
                "outputVariable": "out"
            })),
            node_with("done", "end", "Done", json!({ "outputType": "int", "outputValue": 3 })),
        ],
        "edges": [edge("start", "call", None), edge("call", "done", Some(" "))]
    }));

    assert_eq!(workflow.output_type, Some(OutputType::Int));
    assert_eq!(workflow.edges[1].label, None);
    match &workflow.node("call").unwrap().kind {
        NodeKind::Subprocess(call) => {
            assert_eq!(call.subworkflow_id, "other");
            assert_eq!(call.output_variable, "out");
        }
        other => panic!("expected subprocess, got {other:?}"),
    }
    assert!(matches!(workflow.start_node().map(|n| &n.kind), Some(NodeKind::Start)));
}

#[test]
fn test_conversion_errors() {
    let missing = document(json!({
        "id": "broken",
        "nodes": [node("call", "subprocess", "Call")],
        "edges": []
    }))
    .into_workflow()
    .unwrap_err();
    assert_eq!(
        missing,
        ConversionError::MissingField { node_id: "call".into(), field: "subworkflow_id" }
    );

    let unknown = document(json!({ "id": "x", "nodes": [node("n", "portal", "?")] }))
        .into_workflow()
        .unwrap_err();
    assert!(matches!(unknown, ConversionError::UnknownNodeType { .. }));
}

#[test]
fn test_input_file_values() {
    let file = InputFile::from_json_str(r#"{ "bmi": 15.5, "Quantity": 3, "name": "Ada", "flag": true }"#)
        .unwrap();
    assert_eq!(file.len(), 4);

    let values = file.into_values();
    assert_eq!(values.get("bmi"), Some(&Value::Float(15.5)));
    assert_eq!(values.get("Quantity"), Some(&Value::Int(3)));
    assert_eq!(values.get("name"), Some(&Value::String("Ada".into())));
    assert_eq!(values.get("flag"), Some(&Value::Bool(true)));

    assert!(matches!(
        InputFile::from_json_str("[1, 2]"),
        Err(DataError::Json { .. })
    ));
}

#[test]
fn test_workflow_library_loads_directory() {
    let dir = std::env::temp_dir().join(format!("keiro-library-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("doubler.json"), doubler_json().to_string()).unwrap();
    fs::write(dir.join("parent.json"), parent_json().to_string()).unwrap();
    fs::write(dir.join("broken.json"), "{ not json").unwrap();
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let library = WorkflowLibrary::from_dir(&dir).unwrap();
    assert_eq!(library.len(), 2);
    assert_eq!(library.skipped(), &[dir.join("broken.json")]);

    let resolver = library.into_resolver();
    assert!(resolver.resolve("doubler").is_some());
    assert!(resolver.resolve("missing").is_none());

    let loaded = load_workflow(dir.join("parent.json")).unwrap();
    assert_eq!(loaded.id, "parent");
    assert!(matches!(load_workflow(dir.join("broken.json")), Err(DataError::Json { .. })));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_workflow_library_missing_directory() {
    let dir = std::env::temp_dir().join(format!("keiro-missing-{}", uuid::Uuid::new_v4()));
    assert!(matches!(WorkflowLibrary::from_dir(&dir), Err(DataError::Io { .. })));
}
