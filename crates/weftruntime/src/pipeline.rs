use crate::evaluation::{Evaluation, EvaluationConfig};
use crate::library::OperationLibrary;
use serde_json::json;
use std::collections::BTreeMap;
use weftcore::{Dependency, InputBinding, NodeDeclaration, OperationTag, OutputBinding};

/// One node of the compiled scheduling forest. `children` is the
/// reverse-edge set: every node that depends on this one, conditionally
/// or not.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineTreeNode {
    pub name: String,
    pub operation: OperationTag,
    pub inputs: BTreeMap<String, InputBinding>,
    pub outputs: BTreeMap<String, OutputBinding>,
    pub depends_on: Vec<Dependency>,
    pub children: Vec<String>,
}

/// Immutable compiled artifact. Created only by a successful compile;
/// owns no runtime resources.
#[derive(Debug, Clone)]
pub struct Pipeline {
    nodes: BTreeMap<String, PipelineTreeNode>,
    entrypoints: Vec<String>,
}

impl Pipeline {
    pub(crate) fn new(nodes: BTreeMap<String, PipelineTreeNode>, entrypoints: Vec<String>) -> Self {
        Self { nodes, entrypoints }
    }

    pub fn node(&self, name: &str) -> Option<&PipelineTreeNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PipelineTreeNode> {
        self.nodes.values()
    }

    /// Entrypoint node names, in declaration order
    pub fn entrypoints(&self) -> &[String] {
        &self.entrypoints
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Re-serializes the pipeline into its wire format
    pub fn to_json(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for (name, node) in &self.nodes {
            let declaration = NodeDeclaration {
                operation: node.operation.clone(),
                inputs: node.inputs.clone(),
                outputs: node.outputs.clone(),
                depends_on: node.depends_on.clone(),
            };
            root.insert(name.clone(), json!(declaration));
        }
        serde_json::Value::Object(root)
    }

    /// Binds the pipeline to an operation library, producing a reusable
    /// evaluation
    pub fn create_evaluation(&self, library: OperationLibrary, config: EvaluationConfig) -> Evaluation {
        Evaluation::new(self, library, config)
    }
}
