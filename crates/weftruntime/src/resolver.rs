use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use weftcore::{NodeDeclaration, OutputBinding};

/// A reference `(node, outputName)` resolved to the concrete node and
/// result-slot key that produces it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub node_name: String,
    pub slot: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("node `{node}` does not exist")]
    UnknownNode { node: String },

    #[error("node `{node}` declares no output `{output}`")]
    NotFound { node: String, output: String },

    #[error("redirect chain starting at `{node}.{output}` revisits itself")]
    Cycle { node: String, output: String },
}

/// Follows output bindings until a directly-named output is reached.
///
/// A `Named` binding whose public name matches the request resolves
/// immediately to its result-slot key. A `Redirect` binding whose slot
/// key matches the request forwards the lookup to the redirect target,
/// so chains of redirected slots resolve transitively. A chain that
/// revisits a `(node, output)` pair is a resolution cycle and fails
/// rather than looping forever.
pub fn resolve_output(
    nodes: &BTreeMap<String, NodeDeclaration>,
    node_name: &str,
    output_name: &str,
) -> Result<ResolvedOutput, ResolveError> {
    let start_node = node_name.to_string();
    let start_output = output_name.to_string();

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut node = start_node.clone();
    let mut output = start_output.clone();

    loop {
        if !seen.insert((node.clone(), output.clone())) {
            return Err(ResolveError::Cycle {
                node: start_node,
                output: start_output,
            });
        }

        let declaration = nodes.get(&node).ok_or_else(|| ResolveError::UnknownNode {
            node: node.clone(),
        })?;

        if let Some(slot) = declaration.direct_output_slot(&output) {
            return Ok(ResolvedOutput {
                node_name: node,
                slot: slot.to_string(),
            });
        }

        match declaration.outputs.get(&output) {
            Some(OutputBinding::Redirect {
                node_name: target_node,
                input_name: target_input,
            }) => {
                let next_node = target_node.clone();
                let next_output = target_input.clone();
                node = next_node;
                output = next_output;
            }
            _ => {
                return Err(ResolveError::NotFound { node, output });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weftcore::OperationTag;

    fn node(
        operation: &str,
        outputs: Vec<(&str, OutputBinding)>,
    ) -> NodeDeclaration {
        NodeDeclaration {
            operation: OperationTag::parse(operation).unwrap(),
            inputs: BTreeMap::new(),
            outputs: outputs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn resolves_direct_output() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "counter".to_string(),
            node("declare::number", vec![("value", OutputBinding::Named("current".into()))]),
        );

        let resolved = resolve_output(&nodes, "counter", "current").unwrap();
        assert_eq!(resolved.node_name, "counter");
        assert_eq!(resolved.slot, "value");
    }

    #[test]
    fn follows_redirect_chain() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "a".to_string(),
            node(
                "test::chain",
                vec![(
                    "x",
                    OutputBinding::Redirect {
                        node_name: "b".into(),
                        input_name: "y".into(),
                    },
                )],
            ),
        );
        nodes.insert(
            "b".to_string(),
            node("test::chain", vec![("slot", OutputBinding::Named("y".into()))]),
        );

        let resolved = resolve_output(&nodes, "a", "x").unwrap();
        assert_eq!(resolved.node_name, "b");
        assert_eq!(resolved.slot, "slot");
    }

    #[test]
    fn detects_redirect_cycle() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "a".to_string(),
            node(
                "test::chain",
                vec![(
                    "x",
                    OutputBinding::Redirect {
                        node_name: "b".into(),
                        input_name: "y".into(),
                    },
                )],
            ),
        );
        nodes.insert(
            "b".to_string(),
            node(
                "test::chain",
                vec![(
                    "y",
                    OutputBinding::Redirect {
                        node_name: "a".into(),
                        input_name: "x".into(),
                    },
                )],
            ),
        );

        assert_eq!(
            resolve_output(&nodes, "a", "x"),
            Err(ResolveError::Cycle {
                node: "a".into(),
                output: "x".into()
            })
        );
    }

    #[test]
    fn missing_output_fails() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "a".to_string(),
            node("test::chain", vec![("x", OutputBinding::Named("x".into()))]),
        );

        assert!(matches!(
            resolve_output(&nodes, "a", "nope"),
            Err(ResolveError::NotFound { .. })
        ));
        assert!(matches!(
            resolve_output(&nodes, "ghost", "x"),
            Err(ResolveError::UnknownNode { .. })
        ));
    }
}
