use std::collections::HashMap;
use std::sync::Arc;
use weftcore::Operation;

/// The executable counterpart of the signature registry: maps operation
/// tags to their bodies. Supplied by the embedding application when an
/// evaluation is created.
#[derive(Clone, Default)]
pub struct OperationLibrary {
    operations: HashMap<String, Arc<dyn Operation>>,
}

impl OperationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operation: Arc<dyn Operation>) {
        let tag = operation.tag().to_string();
        tracing::debug!(%tag, "registering operation body");
        self.operations.insert(tag, operation);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(tag).cloned()
    }

    /// Registered tags, sorted for stable listings
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<_> = self.operations.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
