//! End-to-end execution tests for the tree interpreter.
mod common;
use common::*;
use keiro::prelude::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn run(json: serde_json::Value, values: &[(&str, Value)]) -> ExecutionResult {
    Interpreter::default().execute(&workflow(json), &inputs(values))
}

fn doubler_resolver() -> InMemoryResolver {
    InMemoryResolver::new().with_workflow(workflow(doubler_json()))
}

#[test]
fn test_structured_condition_takes_yes_branch() {
    let result = run(bmi_json(), &[("bmi", Value::Float(15.0))]);

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, Some(Value::String("Underweight".into())));
    assert_eq!(result.path, vec!["start", "check", "under"]);
    assert_eq!(result.decisions.len(), 1);
    assert!(result.decisions[0].outcome);
    assert_eq!(result.decisions[0].reason, "bmi (was 15) lt 16");
}

#[test]
fn test_structured_condition_takes_no_branch() {
    let result = run(bmi_json(), &[("bmi", Value::Float(22.5))]);
    assert_eq!(result.output, Some(Value::String("Normal".into())));
    assert_eq!(result.path, vec!["start", "check", "normal"]);
    assert_eq!(result.decisions[0].reason, "bmi (was 22.5) lt 16");
}

#[test]
fn test_inputs_can_be_keyed_by_display_name() {
    let result = run(bmi_json(), &[("BMI", Value::Int(12))]);
    assert_eq!(result.output, Some(Value::String("Underweight".into())));
    assert_eq!(result.context.get("bmi"), Some(&Value::Float(12.0)));
}

#[test]
fn test_within_range_is_inclusive() {
    for (bmi, expected) in [(18.5, "Healthy"), (25.0, "Healthy"), (30.0, "Out of range")] {
        let result = run(range_json(), &[("bmi", Value::Float(bmi))]);
        assert_eq!(result.output, Some(Value::String(expected.into())), "bmi {bmi}");
    }

    let result = run(range_json(), &[("bmi", Value::Float(20.0))]);
    assert_eq!(result.decisions[0].reason, "bmi (was 20) within_range 18.5..25");
}

#[test]
fn test_unlabelled_edges_resolve_by_position() {
    let pass = run(score_json(), &[("score", Value::Int(70))]);
    assert_eq!(pass.output, Some(Value::String("Pass".into())));
    assert_eq!(pass.decisions[0].reason, "score (was 70) >= 50");

    let fail = run(score_json(), &[("score", Value::Int(20))]);
    assert_eq!(fail.output, Some(Value::String("Fail".into())));
}

#[test]
fn test_partial_labels_fill_remaining_slot() {
    let mut json = score_json();
    json["edges"][1]["label"] = json!("no");

    // The labelled edge takes the false slot, so the unlabelled one is true.
    let result = run(json, &[("score", Value::Int(70))]);
    assert_eq!(result.output, Some(Value::String("Fail".into())));
}

#[test]
fn test_expression_conditions_resolve_display_names() {
    let mut json = score_json();
    json["nodes"][1]["label"] = json!("Score >= 50 AND NOT (score == 99)");
    let result = run(json, &[("score", Value::Int(99))]);
    assert_eq!(result.output, Some(Value::String("Fail".into())));
}

#[test]
fn test_calculation_extends_context_and_renders_template() {
    let result = run(order_json(), &[("price", Value::Float(4.0)), ("quantity", Value::Int(6))]);

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, Some(Value::String("Total: 24".into())));
    assert_eq!(result.context.get("total"), Some(&Value::Float(24.0)));
    assert_eq!(result.path, vec!["start", "calc", "done"]);
}

#[test]
fn test_calculation_failures_are_reported() {
    let mut json = order_json();
    json["nodes"][1]["calculation"]["operator"] = json!("divide");
    json["nodes"][1]["calculation"]["operands"][1] = json!({ "kind": "literal", "value": 0 });
    let result = run(json, &[("price", Value::Float(4.0)), ("quantity", Value::Int(6))]);

    assert!(!result.success);
    assert!(!result.stopped);
    assert_eq!(result.output, None);
    assert_eq!(result.path, vec!["start", "calc"]);
    assert!(result.error.unwrap().contains("Division by zero"));
}

#[test]
fn test_typed_output_keeps_raw_value() {
    let result = run(doubler_json(), &[("n", Value::Int(4))]);
    assert_eq!(result.output, Some(Value::Float(8.0)));
}

#[test]
fn test_output_value_and_coercion() {
    let mut json = bmi_json();
    json["nodes"][2]["output_type"] = json!("int");
    json["nodes"][2]["output_value"] = json!("42");
    let result = run(json, &[("bmi", Value::Float(10.0))]);
    assert_eq!(result.output, Some(Value::Int(42)));

    let mut json = bmi_json();
    json["nodes"][2]["output_type"] = json!("bool");
    let result = run(json, &[("bmi", Value::Float(10.0))]);
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Cannot convert 'Underweight'"));
}

#[test]
fn test_unresolved_placeholder_is_kept_with_warning() {
    let mut json = bmi_json();
    json["variables"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "id": "note", "name": "Note", "type": "string" }));
    json["nodes"][2]["output_template"] = json!("Underweight ({note})");
    let result = run(json, &[("bmi", Value::Float(10.0))]);

    assert!(result.success);
    assert_eq!(result.output, Some(Value::String("Underweight ({note})".into())));
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_subworkflow_result_feeds_parent() {
    let interpreter = Interpreter::builder().with_resolver(doubler_resolver()).build();
    let result = interpreter.execute(&workflow(parent_json()), &inputs(&[("amount", Value::Float(7.0))]));

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, Some(Value::String("Large 14".into())));
    assert_eq!(result.context.get("twice"), Some(&Value::Float(14.0)));
    assert_eq!(result.path, vec!["start", "call", "check", "large"]);

    assert_eq!(result.subflow_results.len(), 1);
    let sub = &result.subflow_results[0];
    assert_eq!(sub.node_id, "call");
    assert_eq!(sub.subworkflow_id, "doubler");
    assert!(sub.result.success);
    assert_eq!(sub.result.path, vec!["start", "calc", "done"]);
    assert_eq!(sub.result.context.get("n"), Some(&Value::Float(7.0)));
}

#[test]
fn test_small_subworkflow_result() {
    let interpreter = Interpreter::builder().with_resolver(doubler_resolver()).build();
    let result = interpreter.execute(&workflow(parent_json()), &inputs(&[("amount", Value::Int(2))]));
    assert_eq!(result.output, Some(Value::String("Small".into())));
}

#[test]
fn test_subworkflow_cycle_is_fatal() {
    let resolver = InMemoryResolver::new()
        .with_workflow(workflow(caller_json("a", "b")))
        .with_workflow(workflow(caller_json("b", "a")));
    let root = workflow(caller_json("a", "b"));
    let result = Interpreter::builder()
        .with_resolver(resolver)
        .build()
        .execute(&root, &InputValues::new());

    assert!(!result.success);
    assert!(!result.stopped);
    assert_eq!(
        result.error.as_deref(),
        Some("Sub-workflow cycle detected: a → b → a")
    );
    assert_eq!(result.subflow_results.len(), 1);
    assert!(!result.subflow_results[0].result.success);
}

#[test]
fn test_unresolved_subworkflow_fails() {
    let resolver = InMemoryResolver::new();
    let result = Interpreter::builder()
        .with_resolver(resolver)
        .build()
        .execute(&workflow(parent_json()), &inputs(&[("amount", Value::Float(1.0))]));
    assert_eq!(
        result.error.as_deref(),
        Some("Sub-workflow 'doubler' could not be resolved")
    );
}

#[test]
fn test_missing_resolver_injects_null() {
    let result = run(caller_json("solo", "elsewhere"), &[]);

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, Some(Value::String("Done".into())));
    assert_eq!(result.context.get("result"), Some(&Value::Null));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.subflow_results.is_empty());
}

#[test]
fn test_mapped_variable_without_value() {
    let interpreter = Interpreter::builder().with_resolver(doubler_resolver()).build();
    let result = interpreter.execute(&workflow(parent_json()), &InputValues::new());
    assert!(!result.success);
    assert!(result.error.unwrap().contains("'amount'"));
}

#[test]
fn test_closure_resolver() {
    let doubler = Arc::new(workflow(doubler_json()));
    let interpreter = Interpreter::builder()
        .with_resolver(move |id: &str| (id == "doubler").then(|| Arc::clone(&doubler)))
        .build();
    let result = interpreter.execute(&workflow(parent_json()), &inputs(&[("amount", Value::Float(6.0))]));
    assert_eq!(result.output, Some(Value::String("Large 12".into())));
}

#[test]
fn test_subworkflows_without_ids_are_not_a_cycle() {
    let mut parent = caller_json("ignored", "child");
    parent.as_object_mut().unwrap().remove("id");
    let mut child = doubler_json();
    child.as_object_mut().unwrap().remove("id");
    child["variables"] = json!([]);
    child["nodes"][1]["calculation"]["operands"][0] = json!({ "kind": "literal", "value": 4 });

    let child = Arc::new(workflow(child));
    let parent = workflow(parent);
    assert_eq!(parent.id, "");
    assert_eq!(child.id, "");

    let result = Interpreter::builder()
        .with_resolver(move |id: &str| (id == "child").then(|| Arc::clone(&child)))
        .build()
        .execute(&parent, &InputValues::new());

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.context.get("result"), Some(&Value::Float(8.0)));
    assert_eq!(result.subflow_results[0].subworkflow_id, "child");
}

#[test]
fn test_cycle_chain_uses_resolution_keys() {
    // "b" resolves to a workflow whose own id is "x".
    let a = Arc::new(workflow(caller_json("a", "b")));
    let b = Arc::new(workflow(caller_json("x", "a")));
    let root = Arc::clone(&a);
    let result = Interpreter::builder()
        .with_resolver(move |id: &str| match id {
            "a" => Some(Arc::clone(&a)),
            "b" => Some(Arc::clone(&b)),
            _ => None,
        })
        .build()
        .execute(&root, &InputValues::new());

    assert_eq!(
        result.error.as_deref(),
        Some("Sub-workflow cycle detected: a → b → a")
    );
}

#[test]
fn test_subprocess_output_cannot_shadow_declared_variable() {
    let mut json = parent_json();
    json["nodes"][1]["output_variable"] = json!("amount");

    let result = Interpreter::builder()
        .with_resolver(doubler_resolver())
        .build()
        .execute(&workflow(json), &inputs(&[("amount", Value::Float(7.0))]));

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Derived variable 'amount' collides with a declared variable id")
    );
    assert!(result.subflow_results.is_empty());
}

#[test]
fn test_single_branch_decision_skips_its_condition() {
    let json = json!({
        "id": "passthrough",
        "name": "Passthrough",
        "variables": [{ "id": "flag", "name": "Flag", "type": "bool" }],
        "nodes": [
            node("start", "start", "Start"),
            node_with("check", "decision", "Flag set?", json!({
                "condition": { "input_id": "flag", "comparator": "is_true", "value": null }
            })),
            node("done", "end", "Done"),
        ],
        "edges": [
            edge("start", "check", None),
            edge("check", "done", Some("yes")),
        ]
    });

    let result = run(json, &[]);
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, Some(Value::String("Done".into())));
    assert_eq!(result.path, vec!["start", "check", "done"]);
    assert!(result.decisions.is_empty());
}

#[test]
fn test_long_linear_workflow_runs_on_a_small_stack() {
    with_small_stack(|| {
        let result = run(chain_json(5_000), &[("x", Value::Float(0.5))]);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output, Some(Value::Float(5_000.5)));
        assert_eq!(result.path.len(), 5_002);
    });
}

#[test]
fn test_invalid_inputs_are_rejected() {
    let result = run(bmi_json(), &[("bmi", Value::String("heavy".into()))]);
    assert!(!result.success);
    assert!(result.path.is_empty());
    let error = result.error.unwrap();
    assert!(error.starts_with("Invalid input for 'BMI'"), "{error}");

    let result = run(order_json(), &[("price", Value::Float(1.0)), ("quantity", Value::Int(500))]);
    assert!(result.error.unwrap().contains("outside the allowed range"));

    let result = run(order_json(), &[("price", Value::Float(1.0)), ("quantity", Value::Float(2.5))]);
    assert!(!result.success);
}

#[test]
fn test_missing_input_fails_at_decision() {
    let result = run(bmi_json(), &[]);
    assert!(!result.success);
    assert_eq!(result.path, vec!["start", "check"]);
    assert!(result.error.unwrap().contains("Variable 'bmi' not found"));
}

#[test]
fn test_missing_start_node() {
    let mut json = bmi_json();
    json["nodes"][0]["type"] = json!("end");
    let result = run(json, &[("bmi", Value::Float(10.0))]);
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Workflow 'bmi_check' has no start node")
    );
}

#[test]
fn test_cyclic_graph_is_reported() {
    let json = json!({
        "id": "loop",
        "variables": [{ "id": "x", "name": "X", "type": "int" }],
        "nodes": [
            node("s", "start", "Start"),
            node("a", "decision", "x > 1"),
            node("b", "decision", "x > 2"),
            node("e", "end", "Done"),
        ],
        "edges": [
            edge("s", "a", None),
            edge("a", "b", Some("yes")),
            edge("a", "e", Some("no")),
            edge("b", "a", Some("yes")),
            edge("b", "e", Some("no")),
        ]
    });
    let result = run(json, &[("x", Value::Int(5))]);
    assert!(!result.success);
    assert!(result.error.unwrap().contains("cycle"));
}

#[test]
fn test_invalid_condition_is_reported_at_runtime() {
    let mut json = score_json();
    json["nodes"][1]["label"] = json!("score >=");
    let result = run(json, &[("score", Value::Int(1))]);
    assert!(!result.success);
    assert!(result.error.unwrap().contains("unusable condition"));
}

#[test]
fn test_observer_sees_every_step_in_order() {
    let events: Arc<Mutex<Vec<StepEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let interpreter = Interpreter::builder()
        .with_resolver(doubler_resolver())
        .with_observer(move |event: &StepEvent| -> std::result::Result<(), StepError> {
            sink.lock().push(event.clone());
            Ok(())
        })
        .build();
    let result = interpreter.execute(&workflow(parent_json()), &inputs(&[("amount", Value::Float(7.0))]));
    assert!(result.success);

    let events = events.lock();
    let steps: Vec<(usize, &str)> = events
        .iter()
        .map(|e| (e.step_index, e.node_id.as_str()))
        .collect();
    assert_eq!(
        steps,
        vec![
            (0, "start"),
            (1, "call"),
            (2, "start"),
            (3, "calc"),
            (4, "done"),
            (5, "check"),
            (6, "large"),
        ]
    );

    assert_eq!(events[0].subflow, None);
    let nested = events[3].subflow.as_ref().unwrap();
    assert_eq!(nested.subworkflow_id, "doubler");
    assert_eq!(nested.parent_node_id, "call");
    assert_eq!(nested.depth, 1);
    assert_eq!(events[5].context.get("twice"), Some(&Value::Float(14.0)));
}

#[test]
fn test_failing_observer_does_not_abort() {
    let interpreter = Interpreter::builder()
        .with_observer(|_: &StepEvent| -> std::result::Result<(), StepError> {
            Err(StepError::Failed("sink offline".into()))
        })
        .build();
    let result = interpreter.execute(&workflow(bmi_json()), &inputs(&[("bmi", Value::Float(15.0))]));
    assert!(result.success);
    assert_eq!(result.output, Some(Value::String("Underweight".into())));
}

#[test]
fn test_observer_can_stop_execution() {
    let interpreter = Interpreter::builder()
        .with_observer(|event: &StepEvent| -> std::result::Result<(), StepError> {
            if event.node_type == "decision" {
                Err(StepError::Stopped)
            } else {
                Ok(())
            }
        })
        .build();
    let result = interpreter.execute(&workflow(bmi_json()), &inputs(&[("bmi", Value::Float(15.0))]));

    assert!(result.stopped);
    assert!(!result.success);
    assert_eq!(result.error, None);
    assert_eq!(result.output, None);
    assert_eq!(result.path, vec!["start"]);
}

#[test]
fn test_execution_is_deterministic() {
    let interpreter = Interpreter::builder().with_resolver(doubler_resolver()).build();
    let parent = workflow(parent_json());
    let values = inputs(&[("amount", Value::Float(7.0))]);

    let first = interpreter.execute(&parent, &values);
    for _ in 0..5 {
        let again = interpreter.execute(&parent, &values);
        assert_eq!(again.output, first.output);
        assert_eq!(again.path, first.path);
        assert_eq!(again.decisions, first.decisions);
    }
}

#[test]
fn test_result_serializes_to_json() {
    let result = run(bmi_json(), &[("bmi", Value::Float(15.0))]);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["success"], json!(true));
    assert_eq!(json["output"], json!("Underweight"));
    assert_eq!(json["path"], json!(["start", "check", "under"]));
    assert_eq!(json["decisions"][0]["reason"], json!("bmi (was 15) lt 16"));
}
