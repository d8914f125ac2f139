use thiserror::Error;

/// Failures raised by operation bodies
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("missing required input: {0}")]
    MissingInput(String),

    #[error("invalid input type for `{field}`: expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("cancelled")]
    Cancelled,
}

/// Failures raised while driving one entrypoint's run. A thread that ends
/// in `Error` carries one of these and re-raises it on await.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("no implementation registered for operation `{operation}` (node `{node}`)")]
    OperationNotFound { node: String, operation: String },

    #[error("no compiled procedure for node `{node}`")]
    ProcedureNotFound { node: String },

    #[error("node `{node}` read missing output `{source_node}.{output}`")]
    MissingOutput {
        node: String,
        source_node: String,
        output: String,
    },

    #[error("node `{node}` failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: OperationError,
    },

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("cascade depth exceeded the configured limit of {limit}")]
    CascadeDepthExceeded { limit: usize },
}
