use crate::pipeline::Pipeline;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use weftcore::{Dependency, InputBinding, OperationTag, OutputBinding};

/// Executable form of one pipeline node. Built once per plan and shared
/// by every run of that entrypoint; holds no per-run state.
#[derive(Debug, Clone)]
pub struct ProcedureSpec {
    pub name: String,
    pub operation: OperationTag,
    /// Boolean gates `(gate_node, gate_output)` this node is conditional on
    pub conditional_deps: Vec<(String, String)>,
    pub inputs: Vec<(String, InputBinding)>,
    /// Distinct nodes whose outputs feed this node's inputs
    pub input_sources: Vec<String>,
    pub outputs: Vec<(String, OutputBinding)>,
    pub children: Vec<String>,
}

/// Per-entrypoint execution plan: the procedures reachable from one
/// entrypoint plus the reverse edges used for invalidation.
///
/// Reachability here is wider than the cascade tree: a node pulled in
/// only as an input source or a conditional gate still needs a
/// procedure, so the walk follows children, input sources and gates.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    entrypoint: String,
    procedures: HashMap<String, ProcedureSpec>,
    /// For each node, the nodes that must be re-run when its outputs
    /// change: cascade children plus every node reading its outputs
    dependents: HashMap<String, Vec<String>>,
}

impl ExecutionPlan {
    pub fn build(pipeline: &Pipeline, entrypoint: &str) -> Self {
        let mut procedures: HashMap<String, ProcedureSpec> = HashMap::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        let mut enqueued: HashSet<String> = HashSet::new();

        queue.push_back(entrypoint.to_string());
        enqueued.insert(entrypoint.to_string());

        while let Some(name) = queue.pop_front() {
            let Some(node) = pipeline.node(&name) else {
                continue;
            };

            let conditional_deps: Vec<(String, String)> = node
                .depends_on
                .iter()
                .filter_map(|dep| match dep {
                    Dependency::Conditional {
                        node_name,
                        output_name,
                    } => Some((node_name.clone(), output_name.clone())),
                    Dependency::Unconditional(_) => None,
                })
                .collect();

            let inputs: Vec<(String, InputBinding)> = node
                .inputs
                .iter()
                .map(|(input, binding)| (input.clone(), binding.clone()))
                .collect();

            let input_sources = distinct_sources(&node.inputs);

            let spec = ProcedureSpec {
                name: name.clone(),
                operation: node.operation.clone(),
                conditional_deps,
                inputs,
                input_sources,
                outputs: node
                    .outputs
                    .iter()
                    .map(|(slot, binding)| (slot.clone(), binding.clone()))
                    .collect(),
                children: node.children.clone(),
            };

            let next: Vec<String> = spec
                .children
                .iter()
                .chain(spec.input_sources.iter())
                .chain(spec.conditional_deps.iter().map(|(gate, _)| gate))
                .cloned()
                .collect();
            procedures.insert(name, spec);

            for neighbor in next {
                if enqueued.insert(neighbor.clone()) {
                    queue.push_back(neighbor);
                }
            }
        }

        let dependents = build_dependents(&procedures);

        Self {
            entrypoint: entrypoint.to_string(),
            procedures,
            dependents,
        }
    }

    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    pub fn procedure(&self, name: &str) -> Option<&ProcedureSpec> {
        self.procedures.get(name)
    }

    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

fn distinct_sources(inputs: &BTreeMap<String, InputBinding>) -> Vec<String> {
    let mut sources = Vec::new();
    for binding in inputs.values() {
        if let InputBinding::OutputOf { node_name, .. } = binding {
            if !sources.contains(node_name) {
                sources.push(node_name.clone());
            }
        }
    }
    sources
}

fn build_dependents(procedures: &HashMap<String, ProcedureSpec>) -> HashMap<String, Vec<String>> {
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    let push = |source: &str, reader: &str, map: &mut HashMap<String, Vec<String>>| {
        let entry = map.entry(source.to_string()).or_default();
        if !entry.iter().any(|existing| existing == reader) {
            entry.push(reader.to_string());
        }
    };

    let mut names: Vec<&String> = procedures.keys().collect();
    names.sort();

    for name in names {
        let spec = &procedures[name.as_str()];
        for child in &spec.children {
            push(name, child, &mut dependents);
        }
        for source in &spec.input_sources {
            push(source, name, &mut dependents);
        }
    }

    dependents
}
