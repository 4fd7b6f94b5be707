//! Tests for compiling workflows to Python source.
mod common;
use common::*;
use keiro::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn compile(json: serde_json::Value) -> CompilationResult {
    let workflow = workflow(json);
    SourceCompiler::builder(&workflow).build().compile()
}

fn doubler_resolver() -> InMemoryResolver {
    InMemoryResolver::new().with_workflow(workflow(doubler_json()))
}

#[test]
fn test_compiles_structured_decision() {
    let result = compile(bmi_json());
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.warnings, Vec::<String>::new());

    let expected = r#"# Workflow: BMI Check (bmi_check)
def bmi_check(bmi: float) -> str:
    """BMI Check.

    Args:
        bmi (float): BMI

    Returns:
        str: The workflow output (string).
    """
    if bmi < 16:
        return 'Underweight'
    else:
        return 'Normal'
"#;
    assert_eq!(result.code, expected);
}

#[test]
fn test_within_range_becomes_chained_comparison() {
    let result = compile(range_json());
    assert!(result.code.contains("    if 18.5 <= bmi <= 25:\n"));
    assert!(result.code.contains("        return 'Healthy'\n"));
}

#[test]
fn test_expression_condition_with_positional_branches() {
    let result = compile(score_json());
    assert!(result.success);
    assert!(result.code.contains("def exam(score: int) -> str:"));
    assert!(result.code.contains("    if score >= 50:\n        return 'Pass'\n    else:\n        return 'Fail'\n"));
}

#[test]
fn test_logical_expressions_use_python_keywords() {
    let mut json = score_json();
    json["nodes"][1]["label"] = json!("Score >= 50 AND NOT (score == 99 OR score == 98)");
    let result = compile(json);
    assert!(
        result.code.contains("if score >= 50 and not (score == 99 or score == 98):"),
        "{}",
        result.code
    );
}

#[test]
fn test_calculation_and_template() {
    let result = compile(order_json());
    assert!(result.success);

    let code = &result.code;
    assert!(code.contains("def order_total(price: float, quantity: int) -> str:"));
    assert!(code.contains("quantity (int): Quantity, 1 to 100"));
    assert!(code.contains("    total = float((price * quantity))\n"));
    assert!(code.contains("    return f'Total: {_fmt(total)}'\n"));
    assert!(code.starts_with("def _fmt(value):"));
}

#[test]
fn test_math_operators_import_modules() {
    let mut json = order_json();
    json["nodes"][1]["calculation"] = json!({
        "output_name": "Total",
        "operator": "variance",
        "operands": [
            { "kind": "variable", "ref": "price" },
            { "kind": "variable", "ref": "quantity" },
            { "kind": "literal", "value": 3 }
        ]
    });
    let result = compile(json);
    assert!(result.code.starts_with("import statistics\n"));
    assert!(result.code.contains("total = float(statistics.pvariance([price, quantity, 3]))"));

    let mut json = order_json();
    json["nodes"][1]["calculation"]["operator"] = json!("hypot");
    let result = compile(json);
    assert!(result.code.starts_with("import math\n"));
    assert!(result.code.contains("total = float(math.hypot(price, quantity))"));
}

#[test]
fn test_typed_single_placeholder_returns_raw_value() {
    let result = compile(doubler_json());
    assert!(result.code.contains("def doubler(n: float) -> float:"));
    assert!(result.code.contains("    doubled = float((n * 2))\n"));
    assert!(result.code.contains("    return doubled\n"));
}

#[test]
fn test_subworkflow_becomes_helper_function() {
    let parent = workflow(parent_json());
    let result = SourceCompiler::builder(&parent)
        .with_resolver(doubler_resolver())
        .build()
        .compile();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.warnings, Vec::<String>::new());

    let code = &result.code;
    assert!(code.contains("# Workflow: Doubler (doubler)\ndef _subflow_doubler(n: float) -> float:"));
    assert!(code.contains("    twice = _subflow_doubler(n=amount)\n"));
    assert!(code.contains("    if twice > 10:\n        return f'Large {_fmt(twice)}'\n"));

    let fmt = code.find("def _fmt(").unwrap();
    let helper = code.find("def _subflow_doubler(").unwrap();
    let main = code.find("def parent(").unwrap();
    assert!(fmt < helper && helper < main);
}

#[test]
fn test_shared_helpers_are_generated_once() {
    let mut json = parent_json();
    json["nodes"].as_array_mut().unwrap().push(node_with("again", "subprocess", "Again", json!({
        "subworkflow_id": "doubler",
        "input_mapping": { "twice": "n" },
        "output_variable": "quad",
        "output_type": "number"
    })));
    json["edges"][3] = edge("check", "again", Some("no"));
    json["edges"].as_array_mut().unwrap().push(edge("again", "small", None));

    let parent = workflow(json);
    let result = SourceCompiler::builder(&parent)
        .with_resolver(doubler_resolver())
        .build()
        .compile();
    assert_eq!(result.code.matches("def _subflow_doubler(").count(), 1);
    assert!(result.code.contains("quad = _subflow_doubler(n=twice)"));
}

#[test]
fn test_missing_resolver_falls_back_with_warning() {
    let result = compile(parent_json());
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("no sub-workflow resolver"));
    assert!(result.code.contains("    # WARNING: subprocess 'call': no sub-workflow resolver is configured\n    twice = None\n"));
}

#[test]
fn test_cyclic_subworkflows_reuse_helper() {
    let resolver = InMemoryResolver::new()
        .with_workflow(workflow(caller_json("a", "b")))
        .with_workflow(workflow(caller_json("b", "a")));
    let root = workflow(caller_json("a", "b"));
    let result = SourceCompiler::builder(&root).with_resolver(resolver).build().compile();

    assert!(result.success);
    assert!(result.warnings.iter().any(|w| w.contains("referenced cyclically")));
    assert!(result.code.contains("result = _subflow_b()"));
    assert!(result.code.contains("result = a()"));
}

#[test]
fn test_unusable_condition_emits_warning() {
    let mut json = score_json();
    json["nodes"][1]["label"] = json!("score >=");
    let result = compile(json);
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.code.contains("    if False:\n"));
}

#[test]
fn test_string_and_date_comparators() {
    let json = json!({
        "id": "triage",
        "name": "Triage",
        "variables": [
            { "id": "code", "name": "Code", "type": "string" },
            { "id": "seen", "name": "Seen", "type": "date" }
        ],
        "nodes": [
            node("start", "start", "Start"),
            node_with("c1", "decision", "Code", json!({
                "condition": { "input_id": "code", "comparator": "str_starts_with", "value": "ER" }
            })),
            node_with("c2", "decision", "Seen", json!({
                "condition": { "input_id": "seen", "comparator": "date_before", "value": "2024-01-01" }
            })),
            node("urgent", "end", "Urgent"),
            node("old", "end", "Old"),
            node("new", "end", "New"),
        ],
        "edges": [
            edge("start", "c1", None),
            edge("c1", "urgent", Some("yes")),
            edge("c1", "c2", Some("no")),
            edge("c2", "old", Some("yes")),
            edge("c2", "new", Some("no")),
        ]
    });
    let result = compile(json);
    let code = &result.code;
    assert!(code.starts_with("from datetime import datetime, timezone\n"));
    assert!(code.contains("if str(code).lower().startswith('er'):"));
    assert!(code.contains("if _date(seen) < _date('2024-01-01'):"));
    assert_eq!(code.matches("def _date(value):").count(), 1);
    assert!(code.contains("seen (str): Seen, ISO-8601 date"));
}

#[test]
fn test_function_name_and_indent_options() {
    let workflow = workflow(bmi_json());
    let result = SourceCompiler::builder(&workflow)
        .with_function_name("Classify BMI")
        .with_indent(2)
        .build()
        .compile();
    assert!(result.code.contains("def classify_bmi(bmi: float) -> str:\n"));
    assert!(result.code.contains("\n  if bmi < 16:\n    return 'Underweight'\n"));
}

#[test]
fn test_identifiers_avoid_keywords_and_collisions() {
    let mut json = bmi_json();
    json["variables"] = json!([
        { "id": "class", "name": "class", "type": "int" },
        { "id": "klass", "name": "Class", "type": "int" },
        { "id": "bmi", "name": "BMI", "type": "float" }
    ]);
    let result = compile(json);
    assert!(result.code.contains("def bmi_check(class_: int, class__2: int, bmi: float) -> str:"));
}

#[test]
fn test_structural_failures_abort() {
    let empty = compile(json!({ "id": "empty", "name": "Empty", "nodes": [], "edges": [] }));
    assert!(!empty.success);
    assert_eq!(empty.code, "");
    assert_eq!(empty.error.as_deref(), Some("Workflow 'empty' has no nodes to compile"));

    let mut json = bmi_json();
    json["nodes"][0]["type"] = json!("end");
    let headless = compile(json);
    assert!(!headless.success);
    assert_eq!(headless.error.as_deref(), Some("Workflow 'bmi_check' has no start node"));
}

#[test]
fn test_compilation_is_deterministic() {
    let parent = workflow(parent_json());
    let compile = || {
        SourceCompiler::builder(&parent)
            .with_resolver(doubler_resolver())
            .build()
            .compile()
            .code
    };
    let first = compile();
    for _ in 0..5 {
        assert_eq!(compile(), first);
    }
}

/// Interpreter output and the compiled return expression for one typed passthrough.
fn typed_return(var_type: &str, output_type: &str, input: Value) -> (ExecutionResult, CompilationResult) {
    let flow = workflow(passthrough_json(var_type, output_type));
    let executed = Interpreter::default().execute(&flow, &inputs(&[("v", input)]));
    let compiled = SourceCompiler::builder(&flow).build().compile();
    (executed, compiled)
}

#[test]
fn test_typed_returns_convert_like_the_interpreter() {
    let cases = [
        ("string", "bool", Value::String("no".into()), Value::Bool(false), "_coerce(v, 'bool')"),
        ("string", "int", Value::String("12.5".into()), Value::Int(12), "int(float(v))"),
        ("string", "float", Value::String("2.5".into()), Value::Float(2.5), "float(v)"),
        ("string", "number", Value::String("12".into()), Value::Int(12), "_coerce(v, 'number')"),
        ("string", "json", Value::String("[1, 2]".into()), Value::Json(json!([1, 2])), "json.loads(v)"),
        ("int", "bool", Value::Int(3), Value::Bool(true), "v != 0"),
        ("int", "int", Value::Int(3), Value::Int(3), "v"),
        ("int", "float", Value::Int(3), Value::Float(3.0), "float(v)"),
        ("int", "number", Value::Int(3), Value::Int(3), "v"),
        ("int", "string", Value::Int(3), Value::String("3".into()), "f'{_fmt(v)}'"),
        ("float", "int", Value::Float(7.9), Value::Int(7), "int(v)"),
        ("float", "float", Value::Float(2.5), Value::Float(2.5), "v"),
        ("float", "number", Value::Float(2.5), Value::Float(2.5), "v"),
        ("float", "json", Value::Float(2.5), Value::Json(json!(2.5)), "v"),
        ("bool", "bool", Value::Bool(true), Value::Bool(true), "v"),
        ("bool", "string", Value::Bool(true), Value::String("true".into()), "f'{_fmt(v)}'"),
        ("bool", "json", Value::Bool(true), Value::Json(json!(true)), "v"),
        ("date", "string", Value::String("2024-01-01".into()), Value::String("2024-01-01".into()), "f'{_fmt(v)}'"),
    ];

    for (var_type, output_type, input, expected, expression) in cases {
        let (executed, compiled) = typed_return(var_type, output_type, input);
        let case = format!("{var_type} -> {output_type}");

        assert!(executed.success, "{case}: {:?}", executed.error);
        assert_eq!(executed.output, Some(expected), "{case}");
        assert!(compiled.success, "{case}: {:?}", compiled.error);
        assert_eq!(compiled.warnings, Vec::<String>::new(), "{case}");
        assert!(
            compiled.code.contains(&format!("    return {expression}\n")),
            "{case}:\n{}",
            compiled.code
        );
    }
}

#[test]
fn test_text_to_bool_uses_interpreter_rules() {
    let (executed, compiled) = typed_return("string", "bool", Value::String("no".into()));
    assert_eq!(executed.output, Some(Value::Bool(false)));

    let code = &compiled.code;
    assert!(code.starts_with("import json\nimport math\n"));
    assert!(code.contains("def _coerce(value, output_type):"));
    assert!(code.contains("            if text.lower() in ('false', 'no', 'n', 'f', '0'):\n                return False\n"));
    assert!(code.contains(
        "    raise ValueError(f\"Cannot convert '{_fmt(value)}' to output type '{output_type}'\")\n"
    ));
    let fmt = code.find("def _fmt(").unwrap();
    let coerce = code.find("def _coerce(").unwrap();
    let main = code.find("def passthrough(").unwrap();
    assert!(fmt < coerce && coerce < main);

    let (executed, _) = typed_return("string", "bool", Value::String("maybe".into()));
    assert_eq!(
        executed.error.as_deref(),
        Some("Output of node 'done' is invalid: Cannot convert 'maybe' to output type 'bool'")
    );
}

#[test]
fn test_impossible_conversions_raise() {
    for (var_type, output_type, input) in [
        ("float", "bool", Value::Float(2.5)),
        ("bool", "int", Value::Bool(true)),
        ("bool", "number", Value::Bool(false)),
    ] {
        let (executed, compiled) = typed_return(var_type, output_type, input);
        let case = format!("{var_type} -> {output_type}");

        assert!(!executed.success, "{case}");
        assert!(executed.error.unwrap().contains("Cannot convert"), "{case}");
        assert!(compiled.success, "{case}");
        assert_eq!(compiled.warnings.len(), 1, "{case}");
        assert!(
            compiled.warnings[0].contains(&format!("a {var_type} value cannot be converted to output type '{output_type}'")),
            "{case}: {:?}",
            compiled.warnings
        );
        assert!(
            compiled.code.contains(&format!(
                "    raise ValueError('end node \\'done\\': \\'v\\': a {var_type} value cannot"
            )),
            "{case}:\n{}",
            compiled.code
        );
    }
}

#[test]
fn test_dates_with_offsets_compare_in_utc() {
    let json = json!({
        "id": "signup",
        "name": "Signup",
        "variables": [{ "id": "joined", "name": "Joined", "type": "date" }],
        "nodes": [
            node("start", "start", "Start"),
            node_with("check", "decision", "Joined early?", json!({
                "condition": { "input_id": "joined", "comparator": "date_before", "value": "2024-06-01" }
            })),
            node("early", "end", "early"),
            node("late", "end", "late"),
        ],
        "edges": [
            edge("start", "check", None),
            edge("check", "early", Some("yes")),
            edge("check", "late", Some("no")),
        ]
    });

    let flow = workflow(json.clone());
    let executed = Interpreter::default().execute(
        &flow,
        &inputs(&[("joined", Value::String("2024-01-01T00:00:00Z".into()))]),
    );
    assert_eq!(executed.output, Some(Value::String("early".into())));

    let code = compile(json).code;
    assert!(code.starts_with("from datetime import datetime, timezone\n"));
    assert!(code.contains("    if _date(joined) < _date('2024-06-01'):\n"));
    assert!(code.contains("        text = text[:-1] + '+00:00'\n"));
    assert!(code.contains("        parsed = parsed.astimezone(timezone.utc).replace(tzinfo=None)\n"));
    assert!(code.find("def _date(").unwrap() < code.find("def signup(").unwrap());
}

#[test]
fn test_subprocess_results_convert_from_helper_type() {
    let child = json!({
        "id": "answer",
        "name": "Answer",
        "variables": [{ "id": "text", "name": "Text", "type": "string" }],
        "nodes": [
            node("start", "start", "Start"),
            node_with("done", "end", "Done", json!({ "output_template": "{text}" })),
        ],
        "edges": [edge("start", "done", None)]
    });
    let parent = json!({
        "id": "consent",
        "name": "Consent",
        "variables": [{ "id": "reply", "name": "Reply", "type": "string" }],
        "nodes": [
            node("start", "start", "Start"),
            node_with("ask", "subprocess", "Ask", json!({
                "subworkflow_id": "answer",
                "input_mapping": { "reply": "text" },
                "output_variable": "agreed",
                "output_type": "bool"
            })),
            node_with("done", "end", "Done", json!({
                "output_type": "bool",
                "output_template": "{agreed}"
            })),
        ],
        "edges": [
            edge("start", "ask", None),
            edge("ask", "done", None),
        ]
    });

    let resolver = InMemoryResolver::new().with_workflow(workflow(child));
    let parent = workflow(parent);

    let executed = Interpreter::builder()
        .with_resolver(resolver.clone())
        .build()
        .execute(&parent, &inputs(&[("reply", Value::String("Yes".into()))]));
    assert!(executed.success, "{:?}", executed.error);
    assert_eq!(executed.output, Some(Value::Bool(true)));

    let compiled = SourceCompiler::builder(&parent).with_resolver(resolver).build().compile();
    assert_eq!(compiled.warnings, Vec::<String>::new());
    assert!(compiled.code.contains("    agreed = _coerce(_subflow_answer(text=reply), 'bool')\n"));
    assert!(compiled.code.contains("    return agreed\n"));
}

#[test]
fn test_long_linear_workflow_compiles_on_a_small_stack() {
    with_small_stack(|| {
        let result = compile(chain_json(5_000));
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.warnings, Vec::<String>::new());
        assert!(result.code.contains("    step_1 = float((x + 1))\n"));
        assert!(result.code.contains("    step_5000 = float((step_4999 + 1))\n    return step_5000\n"));
    });
}
