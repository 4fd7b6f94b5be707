//! Common test utilities for building workflow documents and inputs.
use keiro::prelude::*;
use serde_json::{Value as Json, json};

/// Deserializes a workflow document from a `json!` literal.
#[allow(dead_code)]
pub fn document(json: Json) -> WorkflowDocument {
    serde_json::from_value(json).expect("test document should deserialize")
}

/// Deserializes and converts a workflow from a `json!` literal.
#[allow(dead_code)]
pub fn workflow(json: Json) -> Workflow {
    document(json)
        .into_workflow()
        .expect("test workflow should convert")
}

#[allow(dead_code)]
pub fn node(id: &str, node_type: &str, label: &str) -> Json {
    json!({ "id": id, "type": node_type, "label": label, "x": 0, "y": 0 })
}

/// A node with extra type-specific fields merged in.
#[allow(dead_code)]
pub fn node_with(id: &str, node_type: &str, label: &str, fields: Json) -> Json {
    let mut base = node(id, node_type, label);
    if let (Some(base), Some(extra)) = (base.as_object_mut(), fields.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    base
}

#[allow(dead_code)]
pub fn edge(from: &str, to: &str, label: Option<&str>) -> Json {
    match label {
        Some(label) => json!({ "id": format!("{from}-{to}"), "from": from, "to": to, "label": label }),
        None => json!({ "id": format!("{from}-{to}"), "from": from, "to": to }),
    }
}

#[allow(dead_code)]
pub fn inputs(pairs: &[(&str, Value)]) -> InputValues {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// BMI triage with a structured condition.
///
/// Logic: `bmi lt 16` -> "Underweight", otherwise "Normal"
#[allow(dead_code)]
pub fn bmi_json() -> Json {
    json!({
        "id": "bmi_check",
        "name": "BMI Check",
        "variables": [{ "id": "bmi", "name": "BMI", "type": "float" }],
        "nodes": [
            node("start", "start", "Start"),
            node_with("check", "decision", "BMI below 16?", json!({
                "condition": { "input_id": "bmi", "comparator": "lt", "value": 16 }
            })),
            node("under", "end", "Underweight"),
            node("normal", "end", "Normal"),
        ],
        "edges": [
            edge("start", "check", None),
            edge("check", "under", Some("yes")),
            edge("check", "normal", Some("no")),
        ]
    })
}

/// Healthy range check using `within_range`.
///
/// Logic: `18.5 <= bmi <= 25` -> "Healthy", otherwise "Out of range"
#[allow(dead_code)]
pub fn range_json() -> Json {
    json!({
        "id": "bmi_range",
        "name": "BMI Range",
        "variables": [{ "id": "bmi", "name": "BMI", "type": "float" }],
        "nodes": [
            node("start", "start", "Start"),
            node_with("check", "decision", "Healthy range?", json!({
                "condition": { "input_id": "bmi", "comparator": "within_range", "value": 18.5, "value2": 25 }
            })),
            node("healthy", "end", "Healthy"),
            node("other", "end", "Out of range"),
        ],
        "edges": [
            edge("start", "check", None),
            edge("check", "healthy", Some("true")),
            edge("check", "other", Some("false")),
        ]
    })
}

/// A free-text condition with unlabelled edges, resolved by position.
///
/// Logic: `score >= 50` -> "Pass" (first edge), otherwise "Fail" (second edge)
#[allow(dead_code)]
pub fn score_json() -> Json {
    json!({
        "id": "exam",
        "name": "Exam",
        "variables": [{ "id": "score", "name": "Score", "type": "int" }],
        "nodes": [
            node("start", "start", "Start"),
            node("check", "decision", "score >= 50"),
            node("pass", "end", "Pass"),
            node("fail", "end", "Fail"),
        ],
        "edges": [
            edge("start", "check", None),
            edge("check", "pass", None),
            edge("check", "fail", None),
        ]
    })
}

/// Computes a derived total and renders it into the output.
///
/// Logic: `Total = price * quantity`, then `"Total: {total}"`
#[allow(dead_code)]
pub fn order_json() -> Json {
    json!({
        "id": "order",
        "name": "Order Total",
        "variables": [
            { "id": "price", "name": "Price", "type": "float" },
            { "id": "quantity", "name": "Quantity", "type": "int", "range": { "min": 1, "max": 100 } }
        ],
        "nodes": [
            node("start", "start", "Start"),
            node_with("calc", "calculation", "Compute total", json!({
                "calculation": {
                    "output_name": "Total",
                    "operator": "multiply",
                    "operands": [
                        { "kind": "variable", "ref": "price" },
                        { "kind": "variable", "ref": "Quantity" }
                    ]
                }
            })),
            node_with("done", "end", "Done", json!({ "output_template": "Total: {total}" })),
        ],
        "edges": [
            edge("start", "calc", None),
            edge("calc", "done", None),
        ]
    })
}

/// Sub-workflow that doubles its input and returns the raw number.
#[allow(dead_code)]
pub fn doubler_json() -> Json {
    json!({
        "id": "doubler",
        "name": "Doubler",
        "variables": [{ "id": "n", "name": "N", "type": "float" }],
        "nodes": [
            node("start", "start", "Start"),
            node_with("calc", "calculation", "Double", json!({
                "calculation": {
                    "output_name": "Doubled",
                    "operator": "multiply",
                    "operands": [
                        { "kind": "variable", "ref": "n" },
                        { "kind": "literal", "value": 2 }
                    ]
                }
            })),
            node_with("done", "end", "Result", json!({
                "output_type": "number",
                "output_template": "{doubled}"
            })),
        ],
        "edges": [
            edge("start", "calc", None),
            edge("calc", "done", None),
        ]
    })
}

/// Calls `doubler` and branches on its result.
///
/// Logic: `twice = doubler(n = amount)`; `twice > 10` -> "Large {twice}", otherwise "Small"
#[allow(dead_code)]
pub fn parent_json() -> Json {
    json!({
        "id": "parent",
        "name": "Parent",
        "variables": [{ "id": "amount", "name": "Amount", "type": "float" }],
        "nodes": [
            node("start", "start", "Start"),
            node_with("call", "subprocess", "Double it", json!({
                "subworkflow_id": "doubler",
                "input_mapping": { "amount": "n" },
                "output_variable": "twice",
                "output_type": "number"
            })),
            node("check", "decision", "twice > 10"),
            node_with("large", "end", "Large", json!({ "output_template": "Large {twice}" })),
            node("small", "end", "Small"),
        ],
        "edges": [
            edge("start", "call", None),
            edge("call", "check", None),
            edge("check", "large", Some("yes")),
            edge("check", "small", Some("no")),
        ]
    })
}

/// A workflow whose single subprocess calls the workflow `target`.
#[allow(dead_code)]
pub fn caller_json(id: &str, target: &str) -> Json {
    json!({
        "id": id,
        "name": id,
        "variables": [],
        "nodes": [
            node("start", "start", "Start"),
            node_with("call", "subprocess", "Call", json!({
                "subworkflow_id": target,
                "input_mapping": {},
                "output_variable": "result"
            })),
            node("done", "end", "Done"),
        ],
        "edges": [
            edge("start", "call", None),
            edge("call", "done", None),
        ]
    })
}

/// Returns its single input `v` through a typed end node.
#[allow(dead_code)]
pub fn passthrough_json(var_type: &str, output_type: &str) -> Json {
    json!({
        "id": "passthrough",
        "name": "Passthrough",
        "variables": [{ "id": "v", "name": "V", "type": var_type }],
        "nodes": [
            node("start", "start", "Start"),
            node_with("done", "end", "Done", json!({
                "output_type": output_type,
                "output_template": "{v}"
            })),
        ],
        "edges": [edge("start", "done", None)]
    })
}

/// `x` followed by `len` calculations, each adding 1 to the previous result.
///
/// Logic: `step_1 = x + 1`, ..., `step_len = step_{len-1} + 1`; returns `step_len`
#[allow(dead_code)]
pub fn chain_json(len: usize) -> Json {
    let mut nodes = vec![node("start", "start", "Start")];
    let mut edges = Vec::with_capacity(len + 1);
    let mut previous_node = "start".to_string();
    let mut previous_value = "x".to_string();

    for i in 1..=len {
        let id = format!("calc_{i}");
        nodes.push(node_with(&id, "calculation", &format!("Step {i}"), json!({
            "calculation": {
                "output_name": format!("Step {i}"),
                "operator": "add",
                "operands": [
                    { "kind": "variable", "ref": previous_value },
                    { "kind": "literal", "value": 1 }
                ]
            }
        })));
        edges.push(edge(&previous_node, &id, None));
        previous_node = id;
        previous_value = format!("step_{i}");
    }

    nodes.push(node_with("done", "end", "Done", json!({
        "output_type": "number",
        "output_template": format!("{{{previous_value}}}")
    })));
    edges.push(edge(&previous_node, "done", None));

    json!({
        "id": "chain",
        "name": "Chain",
        "variables": [{ "id": "x", "name": "X", "type": "float" }],
        "nodes": nodes,
        "edges": edges
    })
}

/// Runs `body` on a thread with a deliberately small stack.
#[allow(dead_code)]
pub fn with_small_stack<F: FnOnce() + Send + 'static>(body: F) {
    std::thread::Builder::new()
        .stack_size(512 * 1024)
        .spawn(body)
        .expect("spawn test thread")
        .join()
        .expect("test thread panicked");
}
