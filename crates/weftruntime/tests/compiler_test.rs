use serde_json::json;
use weftcore::{CompileError, OperationSignature, RefType, SignatureRegistry};
use weftruntime::PipelineCompiler;

fn registry() -> SignatureRegistry {
    let mut registry = SignatureRegistry::new();
    registry.register(
        OperationSignature::new("declare", "number")
            .title("Declare a number")
            .input("value", RefType::Number)
            .output("value", RefType::Number),
    );
    registry.register(
        OperationSignature::new("logic", "subtract")
            .input("a", RefType::Number)
            .input("b", RefType::Number)
            .output("result", RefType::Number),
    );
    registry.register(
        OperationSignature::new("logic", "greaterThanOrEqual")
            .input("a", RefType::Number)
            .input("b", RefType::Number)
            .output("result", RefType::Boolean),
    );
    registry.register(
        OperationSignature::new("log", "info")
            .input("message", RefType::Any),
    );
    registry.register(
        OperationSignature::new("page", "open")
            .input("url", RefType::String)
            .output("page", RefType::handle("page")),
    );
    registry.register(
        OperationSignature::new("page", "close")
            .ref_input("page", RefType::handle("page")),
    );
    registry
}

fn compile(raw: serde_json::Value) -> weftruntime::CompileResult {
    let registry = registry();
    PipelineCompiler::new(&registry).compile(&raw)
}

/// The counter/decrement/check/loop graph: a cycle broken by a
/// conditional dependency, with a redirect feeding the counter back.
fn loop_graph() -> serde_json::Value {
    json!({
        "counter": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 10 } },
            "outputs": { "value": "value" },
            "dependsOn": []
        },
        "decrement": {
            "node": "logic::subtract",
            "inputs": {
                "a": { "type": "outputOf", "nodeName": "counter", "outputName": "value" },
                "b": { "type": "constant", "value": 1 }
            },
            "outputs": { "result": { "nodeName": "counter", "inputName": "value" } },
            "dependsOn": ["counter", "loop"]
        },
        "check": {
            "node": "logic::greaterThanOrEqual",
            "inputs": {
                "a": { "type": "outputOf", "nodeName": "decrement", "outputName": "result" },
                "b": { "type": "constant", "value": 0 }
            },
            "outputs": { "result": "result" },
            "dependsOn": "decrement"
        },
        "loop": {
            "node": "log::info",
            "inputs": { "message": { "type": "constant", "value": "Test" } },
            "outputs": {},
            "dependsOn": [{ "nodeName": "check", "outputName": "result" }]
        }
    })
}

#[test]
fn compiles_the_loop_graph() {
    let result = compile(loop_graph());
    assert_eq!(result.errors, vec![]);
    let pipeline = result.pipeline().unwrap();
    assert_eq!(pipeline.entrypoints(), ["counter"]);
    assert_eq!(pipeline.len(), 4);
}

#[test]
fn non_object_root_is_fatal() {
    let result = compile(json!([1, 2, 3]));
    assert_eq!(result.errors, vec![CompileError::PipelineNotObject]);
    assert!(result.pipeline().is_none());
}

#[test]
fn shape_errors_accumulate_across_nodes() {
    let result = compile(json!({
        "a": 42,
        "b": { "node": "declare::number" },
        "c": {
            "node": "not-a-tag",
            "inputs": {},
            "outputs": {},
            "dependsOn": []
        }
    }));

    assert!(result
        .errors
        .contains(&CompileError::NodeNotObject { node_name: "a".into() }));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::NodeMissingProperty { node_name, property }
            if node_name == "b" && property == "inputs"
    )));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::NodeInvalidPropertyValue { node_name, property, .. }
            if node_name == "c" && property == "node"
    )));
    assert!(result.errors.len() >= 5);
}

#[test]
fn unknown_operation_is_reported() {
    let result = compile(json!({
        "a": { "node": "ghost::op", "inputs": {}, "outputs": {}, "dependsOn": [] }
    }));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::OperationNotFound { node_name, operation }
            if node_name == "a" && operation == "ghost::op"
    )));
}

#[test]
fn dangling_and_self_dependencies() {
    let result = compile(json!({
        "entry": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": {},
            "dependsOn": []
        },
        "a": {
            "node": "log::info",
            "inputs": { "message": { "type": "constant", "value": "x" } },
            "outputs": {},
            "dependsOn": ["ghost", "a", "entry"]
        }
    }));

    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::DependencyNotFound { node_name, dependency }
            if node_name == "a" && dependency == "ghost"
    )));
    assert!(result
        .errors
        .contains(&CompileError::SelfDependency { node_name: "a".into() }));
}

#[test]
fn no_entrypoints_is_reported() {
    let result = compile(json!({
        "a": { "node": "log::info", "inputs": { "message": { "type": "constant", "value": "x" } }, "outputs": {}, "dependsOn": "b" },
        "b": { "node": "log::info", "inputs": { "message": { "type": "constant", "value": "x" } }, "outputs": {}, "dependsOn": "a" }
    }));
    assert!(result.errors.contains(&CompileError::NoEntrypoints));
}

#[test]
fn unreachable_nodes_are_reported() {
    let result = compile(json!({
        "entry": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": {},
            "dependsOn": []
        },
        "a": { "node": "log::info", "inputs": { "message": { "type": "constant", "value": "x" } }, "outputs": {}, "dependsOn": "b" },
        "b": { "node": "log::info", "inputs": { "message": { "type": "constant", "value": "x" } }, "outputs": {}, "dependsOn": "a" }
    }));

    assert!(result
        .errors
        .contains(&CompileError::UnreachableNode { node_name: "a".into() }));
    assert!(result
        .errors
        .contains(&CompileError::UnreachableNode { node_name: "b".into() }));
    assert!(!result
        .errors
        .contains(&CompileError::UnreachableNode { node_name: "entry".into() }));
}

#[test]
fn unconditional_cycle_is_rejected() {
    let result = compile(json!({
        "entry": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": {},
            "dependsOn": []
        },
        "a": { "node": "log::info", "inputs": { "message": { "type": "constant", "value": "x" } }, "outputs": {}, "dependsOn": ["entry", "b"] },
        "b": { "node": "log::info", "inputs": { "message": { "type": "constant", "value": "x" } }, "outputs": {}, "dependsOn": "a" }
    }));

    assert!(result
        .errors
        .contains(&CompileError::UnconditionalCycle { entrypoint: "entry".into() }));
}

#[test]
fn conditional_edge_breaks_the_cycle() {
    // Same shape as above, but the a -> b edge is gated on a boolean
    let result = compile(json!({
        "entry": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": {},
            "dependsOn": []
        },
        "a": {
            "node": "logic::greaterThanOrEqual",
            "inputs": {
                "a": { "type": "constant", "value": 1 },
                "b": { "type": "constant", "value": 0 }
            },
            "outputs": { "result": "result" },
            "dependsOn": ["entry", "b"]
        },
        "b": {
            "node": "log::info",
            "inputs": { "message": { "type": "constant", "value": "x" } },
            "outputs": {},
            "dependsOn": [{ "nodeName": "a", "outputName": "result" }]
        }
    }));

    assert_eq!(result.errors, vec![]);
    assert!(result.is_ok());
}

#[test]
fn conditional_dependency_must_be_a_direct_boolean_output() {
    let result = compile(json!({
        "entry": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": { "value": "value" },
            "dependsOn": []
        },
        "on_number": {
            "node": "log::info",
            "inputs": { "message": { "type": "constant", "value": "x" } },
            "outputs": {},
            "dependsOn": [{ "nodeName": "entry", "outputName": "value" }]
        },
        "on_missing": {
            "node": "log::info",
            "inputs": { "message": { "type": "constant", "value": "x" } },
            "outputs": {},
            "dependsOn": [{ "nodeName": "entry", "outputName": "ghost" }]
        }
    }));

    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::ConditionalDependencyNotBoolean { node_name, .. } if node_name == "on_number"
    )));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::ConditionalDependencyInvalidOutputRef { node_name, .. }
            if node_name == "on_missing"
    )));
}

#[test]
fn input_type_checks() {
    let result = compile(json!({
        "entry": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": "ten" } },
            "outputs": { "value": "value" },
            "dependsOn": []
        },
        "open": {
            "node": "page::open",
            "inputs": { "url": { "type": "outputOf", "nodeName": "entry", "outputName": "value" } },
            "outputs": { "page": "page" },
            "dependsOn": "entry"
        },
        "close": {
            "node": "page::close",
            "inputs": { "page": { "type": "constant", "value": "p" } },
            "outputs": {},
            "dependsOn": "open"
        }
    }));

    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::ConstantTypeMismatch { node_name, input, .. }
            if node_name == "entry" && input == "value"
    )));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::RefInputTypeMismatch { node_name, input, input_type, output_type, .. }
            if node_name == "open" && input == "url"
                && input_type == "string" && output_type == "number"
    )));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::InputNotConstant { node_name, input }
            if node_name == "close" && input == "page"
    )));
}

#[test]
fn unbound_required_input_and_unknown_binding() {
    let result = compile(json!({
        "entry": {
            "node": "logic::subtract",
            "inputs": {
                "a": { "type": "constant", "value": 1 },
                "extra": { "type": "constant", "value": 2 }
            },
            "outputs": { "result": "result", "ghost": "ghost" },
            "dependsOn": []
        }
    }));

    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::RequiredInputUnbound { node_name, input, .. }
            if node_name == "entry" && input == "b"
    )));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::OperationMissingInput { input, .. } if input == "extra"
    )));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::OperationMissingOutput { output, .. } if output == "ghost"
    )));
}

#[test]
fn input_reference_to_unknown_node() {
    let result = compile(json!({
        "entry": {
            "node": "log::info",
            "inputs": { "message": { "type": "outputOf", "nodeName": "ghost", "outputName": "value" } },
            "outputs": {},
            "dependsOn": []
        }
    }));

    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::InputReferenceNotFound { reference_node, .. } if reference_node == "ghost"
    )));
}

#[test]
fn redirect_checks() {
    let result = compile(json!({
        "a": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": { "value": { "nodeName": "ghost", "inputName": "value" } },
            "dependsOn": []
        },
        "b": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": { "value": { "nodeName": "a", "inputName": "ghost" } },
            "dependsOn": []
        },
        "c": {
            "node": "page::open",
            "inputs": { "url": { "type": "constant", "value": "http://x" } },
            "outputs": { "page": { "nodeName": "d", "inputName": "page" } },
            "dependsOn": []
        },
        "d": {
            "node": "page::close",
            "inputs": {},
            "outputs": {},
            "dependsOn": "c"
        },
        "e": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": { "value": { "nodeName": "f", "inputName": "message" } },
            "dependsOn": []
        },
        "f": {
            "node": "page::open",
            "inputs": { "url": { "type": "constant", "value": "http://x" } },
            "outputs": {},
            "dependsOn": "e"
        }
    }));

    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::RedirectTargetNotFound { node_name, target_node, .. }
            if node_name == "a" && target_node == "ghost"
    )));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::RedirectInputNotFound { node_name, target_input, .. }
            if node_name == "b" && target_input == "ghost"
    )));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::RedirectNotConstant { node_name, .. } if node_name == "c"
    )));
    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::RedirectInputNotFound { node_name, .. } if node_name == "e"
    )));
}

#[test]
fn redirect_type_mismatch() {
    let result = compile(json!({
        "a": {
            "node": "logic::greaterThanOrEqual",
            "inputs": {
                "a": { "type": "constant", "value": 1 },
                "b": { "type": "constant", "value": 0 }
            },
            "outputs": { "result": { "nodeName": "b", "inputName": "value" } },
            "dependsOn": []
        },
        "b": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": {},
            "dependsOn": "a"
        }
    }));

    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::RedirectTypeMismatch { node_name, output_type, input_type, .. }
            if node_name == "a" && output_type == "boolean" && input_type == "number"
    )));
}

#[test]
fn redirect_resolution_cycle_is_a_compile_error() {
    // a.x and b.y redirect into each other, so neither ever resolves
    // to a direct output for the reader
    let result = compile(json!({
        "a": {
            "node": "declare::number",
            "inputs": { "value": { "type": "constant", "value": 1 } },
            "outputs": { "value": { "nodeName": "b", "inputName": "value" } },
            "dependsOn": []
        },
        "b": {
            "node": "declare::number",
            "inputs": { "value": { "type": "outputOf", "nodeName": "a", "outputName": "value" } },
            "outputs": { "value": { "nodeName": "a", "inputName": "value" } },
            "dependsOn": "a"
        }
    }));

    assert!(result.errors.iter().any(|error| matches!(
        error,
        CompileError::OutputResolutionFailed { node_name, reference_node, .. }
            if node_name == "b" && reference_node == "a"
    )));
}

#[test]
fn compilation_is_deterministic() {
    let raw = json!({
        "a": 1,
        "z": { "node": "ghost::op", "inputs": {}, "outputs": {}, "dependsOn": "missing" },
        "m": { "node": "declare::number", "inputs": {}, "outputs": {}, "dependsOn": [] }
    });

    let first = compile(raw.clone());
    let second = compile(raw);
    assert_eq!(first.errors, second.errors);

    let ok = compile(loop_graph());
    let again = compile(loop_graph());
    assert_eq!(
        ok.pipeline().unwrap().to_json(),
        again.pipeline().unwrap().to_json()
    );
}
