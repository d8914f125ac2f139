use serde::Serialize;
use thiserror::Error;

/// Compile-time diagnostics. These are accumulated and returned as data,
/// never thrown; a compile call reports every problem it can find in one
/// pass. The only fatal case is a root that is not an object.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CompileError {
    #[error("the pipeline is not an object")]
    PipelineNotObject,

    #[error("node `{node_name}` is not an object")]
    NodeNotObject { node_name: String },

    #[error("node `{node_name}` is missing the `{property}` property")]
    NodeMissingProperty { node_name: String, property: String },

    #[error("node `{node_name}` property `{property}` has type {actual}, expected {expected}")]
    NodeInvalidPropertyType {
        node_name: String,
        property: String,
        expected: String,
        actual: String,
    },

    #[error("node `{node_name}` property `{property}` has an invalid value, expected {expected}")]
    NodeInvalidPropertyValue {
        node_name: String,
        property: String,
        expected: String,
    },

    #[error("node `{node_name}` uses unknown operation `{operation}`")]
    OperationNotFound {
        node_name: String,
        operation: String,
    },

    #[error("node `{node_name}` depends on `{dependency}`, which does not exist")]
    DependencyNotFound {
        node_name: String,
        dependency: String,
    },

    #[error("node `{node_name}` depends on itself")]
    SelfDependency { node_name: String },

    #[error("the pipeline has no entrypoints: at least one node must have zero dependencies")]
    NoEntrypoints,

    #[error("node `{node_name}` is not reachable from any entrypoint")]
    UnreachableNode { node_name: String },

    #[error("entrypoint `{entrypoint}` reaches a cycle made only of unconditional dependencies")]
    UnconditionalCycle { entrypoint: String },

    #[error(
        "node `{node_name}` has a conditional dependency on `{dependency}`, \
         which is not a direct output"
    )]
    ConditionalDependencyInvalidOutputRef {
        node_name: String,
        dependency: String,
    },

    #[error("node `{node_name}` has a conditional dependency on `{dependency}`, which is not boolean")]
    ConditionalDependencyNotBoolean {
        node_name: String,
        dependency: String,
    },

    #[error("operation `{operation}` on node `{node_name}` declares no input `{input}`")]
    OperationMissingInput {
        node_name: String,
        operation: String,
        input: String,
    },

    #[error("operation `{operation}` on node `{node_name}` declares no output `{output}`")]
    OperationMissingOutput {
        node_name: String,
        operation: String,
        output: String,
    },

    #[error("node `{node_name}` does not bind required input `{input}` of `{operation}`")]
    RequiredInputUnbound {
        node_name: String,
        operation: String,
        input: String,
    },

    #[error("input `{input}` of node `{node_name}` cannot be bound to a constant")]
    InputNotConstant { node_name: String, input: String },

    #[error(
        "constant for input `{input}` of node `{node_name}` has type {actual}, expected {expected}"
    )]
    ConstantTypeMismatch {
        node_name: String,
        input: String,
        expected: String,
        actual: String,
    },

    #[error(
        "input `{input}` of node `{node_name}` references node `{reference_node}`, \
         which does not exist"
    )]
    InputReferenceNotFound {
        node_name: String,
        input: String,
        reference_node: String,
    },

    #[error(
        "node `{node_name}` references output `{reference_node}.{output_name}`, \
         which cannot be resolved to a direct output"
    )]
    OutputResolutionFailed {
        node_name: String,
        reference_node: String,
        output_name: String,
    },

    #[error(
        "input `{input}` of node `{node_name}` has type {input_type}, but \
         `{reference_node}.{reference_output}` has type {output_type}"
    )]
    RefInputTypeMismatch {
        node_name: String,
        input: String,
        input_type: String,
        reference_node: String,
        reference_output: String,
        output_type: String,
    },

    #[error(
        "output `{output}` of node `{node_name}` redirects into node `{target_node}`, \
         which does not exist"
    )]
    RedirectTargetNotFound {
        node_name: String,
        output: String,
        target_node: String,
    },

    #[error(
        "output `{output}` of node `{node_name}` redirects into \
         `{target_node}.{target_input}`, which is not a declared input"
    )]
    RedirectInputNotFound {
        node_name: String,
        output: String,
        target_node: String,
        target_input: String,
    },

    #[error(
        "output `{output}` of node `{node_name}` redirects into \
         `{target_node}.{target_input}`, which cannot hold a constant"
    )]
    RedirectNotConstant {
        node_name: String,
        output: String,
        target_node: String,
        target_input: String,
    },

    #[error(
        "output `{output}` of node `{node_name}` has type {output_type}, but redirect \
         target `{target_node}.{target_input}` has type {input_type}"
    )]
    RedirectTypeMismatch {
        node_name: String,
        output: String,
        output_type: String,
        target_node: String,
        target_input: String,
        input_type: String,
    },
}
