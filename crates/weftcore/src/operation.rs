use crate::{EventEmitter, FinalizerScope, OperationError, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub type OperationInputs = HashMap<String, Value>;
pub type OperationOutputs = HashMap<String, Value>;

/// Output values of a single node, keyed by slot or published name
pub type NodeOutputs = HashMap<String, Value>;

/// Core trait implemented by every executable operation
#[async_trait]
pub trait Operation: Send + Sync {
    /// Unique tag in the form `namespace::action`
    fn tag(&self) -> &str;

    /// Execute the operation body with resolved inputs
    async fn invoke(
        &self,
        inputs: OperationInputs,
        ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError>;
}

/// Execution context passed to each operation body
#[derive(Clone)]
pub struct OperationContext {
    /// Name of the pipeline node being executed
    pub node_name: String,

    /// Finalizer registrar for resources acquired by the body
    pub gc: FinalizerScope,

    /// Cancellation signal for the surrounding run
    pub cancellation: CancellationToken,

    /// Shared view over the run's output store, for operations that need
    /// to observe other nodes' results
    pub outputs: OutputStore,

    /// Event emitter scoped to this node
    pub events: EventEmitter,
}

/// Shared per-run store of node outputs. Mutated only by the single
/// cooperative sequence driving the run; the lock is held for individual
/// reads and writes, never across an await.
#[derive(Clone, Default)]
pub struct OutputStore {
    inner: Arc<Mutex<HashMap<String, NodeOutputs>>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: &str, output: &str) -> Option<Value> {
        self.lock().get(node).and_then(|outputs| outputs.get(output)).cloned()
    }

    pub fn set(&self, node: &str, output: &str, value: Value) {
        self.lock()
            .entry(node.to_string())
            .or_default()
            .insert(output.to_string(), value);
    }

    /// Whether the node has produced any outputs yet
    pub fn has_node(&self, node: &str) -> bool {
        self.lock().contains_key(node)
    }

    pub fn node_outputs(&self, node: &str) -> Option<NodeOutputs> {
        self.lock().get(node).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, NodeOutputs> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, NodeOutputs>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Typed accessors over resolved operation inputs
pub trait InputsExt {
    fn require(&self, name: &str) -> Result<&Value, OperationError>;
    fn number(&self, name: &str) -> Result<f64, OperationError>;
    fn boolean(&self, name: &str) -> Result<bool, OperationError>;
    fn string(&self, name: &str) -> Result<&str, OperationError>;
    fn array(&self, name: &str) -> Result<&[Value], OperationError>;
}

impl InputsExt for OperationInputs {
    fn require(&self, name: &str) -> Result<&Value, OperationError> {
        self.get(name)
            .ok_or_else(|| OperationError::MissingInput(name.to_string()))
    }

    fn number(&self, name: &str) -> Result<f64, OperationError> {
        let value = self.require(name)?;
        value.as_f64().ok_or_else(|| OperationError::InvalidInputType {
            field: name.to_string(),
            expected: "number".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    fn boolean(&self, name: &str) -> Result<bool, OperationError> {
        let value = self.require(name)?;
        value.as_bool().ok_or_else(|| OperationError::InvalidInputType {
            field: name.to_string(),
            expected: "boolean".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    fn string(&self, name: &str) -> Result<&str, OperationError> {
        let value = self.require(name)?;
        value.as_str().ok_or_else(|| OperationError::InvalidInputType {
            field: name.to_string(),
            expected: "string".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    fn array(&self, name: &str) -> Result<&[Value], OperationError> {
        let value = self.require(name)?;
        value.as_array().ok_or_else(|| OperationError::InvalidInputType {
            field: name.to_string(),
            expected: "array".to_string(),
            actual: value.type_name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_input_accessors() {
        let mut inputs = OperationInputs::new();
        inputs.insert("a".to_string(), Value::Number(2.0));
        inputs.insert("flag".to_string(), Value::Bool(true));

        assert_eq!(inputs.number("a").unwrap(), 2.0);
        assert!(inputs.boolean("flag").unwrap());
        assert!(matches!(
            inputs.number("flag"),
            Err(OperationError::InvalidInputType { .. })
        ));
        assert!(matches!(
            inputs.string("missing"),
            Err(OperationError::MissingInput(_))
        ));
    }

    #[test]
    fn output_store_reads_and_writes() {
        let store = OutputStore::new();
        assert!(!store.has_node("a"));
        store.set("a", "value", Value::Number(1.0));
        assert_eq!(store.get("a", "value"), Some(Value::Number(1.0)));
        assert!(store.has_node("a"));
        assert!(store.get("a", "other").is_none());
    }
}
