use crate::pipeline::{Pipeline, PipelineTreeNode};
use crate::resolver::resolve_output;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use weftcore::{
    CompileError, Dependency, InputBinding, NodeDeclaration, OperationTag, OutputBinding, RefType,
    SignatureRegistry, Value,
};

/// Outcome of a compile call: either a validated pipeline or the full
/// accumulated diagnostic list, never both.
#[derive(Debug)]
pub struct CompileResult {
    pub errors: Vec<CompileError>,
    pipeline: Option<Pipeline>,
}

impl CompileResult {
    fn failed(errors: Vec<CompileError>) -> Self {
        Self {
            errors,
            pipeline: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    pub fn into_pipeline(self) -> Result<Pipeline, Vec<CompileError>> {
        match self.pipeline {
            Some(pipeline) => Ok(pipeline),
            None => Err(self.errors),
        }
    }
}

/// Validates raw pipeline graphs against a signature registry and builds
/// the compiled scheduling forest.
///
/// Errors are accumulated: every detected problem is reported in one
/// pass. The two exceptions are a non-object root, which is fatal, and
/// unconditional-cycle detection, which stops at the first cycle found.
pub struct PipelineCompiler<'r> {
    registry: &'r SignatureRegistry,
}

impl<'r> PipelineCompiler<'r> {
    pub fn new(registry: &'r SignatureRegistry) -> Self {
        Self { registry }
    }

    pub fn compile(&self, raw: &JsonValue) -> CompileResult {
        let Some(root) = raw.as_object() else {
            return CompileResult::failed(vec![CompileError::PipelineNotObject]);
        };

        let mut errors = Vec::new();
        let declared_names: HashSet<&str> = root.keys().map(String::as_str).collect();

        let mut declarations: BTreeMap<String, NodeDeclaration> = BTreeMap::new();
        for (name, raw_node) in root {
            if let Some(declaration) = parse_node(name, raw_node, &mut errors) {
                declarations.insert(name.clone(), declaration);
            }
        }

        let (nodes, entrypoints) = build_tree(&declarations);

        if entrypoints.is_empty() {
            errors.push(CompileError::NoEntrypoints);
        }

        for unreachable in find_unreachable(&nodes, &entrypoints) {
            errors.push(CompileError::UnreachableNode {
                node_name: unreachable,
            });
        }

        for (name, declaration) in &declarations {
            self.check_node(name, declaration, &declarations, &declared_names, &mut errors);
        }

        for entrypoint in &entrypoints {
            if has_unconditional_cycle(&nodes, entrypoint) {
                errors.push(CompileError::UnconditionalCycle {
                    entrypoint: entrypoint.clone(),
                });
                break;
            }
        }

        if errors.is_empty() {
            tracing::debug!(
                nodes = nodes.len(),
                entrypoints = entrypoints.len(),
                "pipeline compiled"
            );
            CompileResult {
                errors,
                pipeline: Some(Pipeline::new(nodes, entrypoints)),
            }
        } else {
            tracing::debug!(errors = errors.len(), "pipeline compilation failed");
            CompileResult::failed(errors)
        }
    }

    /// Semantic checks that need full-graph context: dependency targets,
    /// operation signatures, constant admissibility, reference types and
    /// redirect targets.
    fn check_node(
        &self,
        name: &str,
        declaration: &NodeDeclaration,
        declarations: &BTreeMap<String, NodeDeclaration>,
        declared_names: &HashSet<&str>,
        errors: &mut Vec<CompileError>,
    ) {
        let signature = self.registry.lookup(declaration.operation.as_str());
        if signature.is_none() {
            errors.push(CompileError::OperationNotFound {
                node_name: name.to_string(),
                operation: declaration.operation.to_string(),
            });
        }

        for dependency in &declaration.depends_on {
            let dep_name = dependency.node_name();
            if !declared_names.contains(dep_name) {
                errors.push(CompileError::DependencyNotFound {
                    node_name: name.to_string(),
                    dependency: dependency.to_string(),
                });
            } else if dep_name == name {
                errors.push(CompileError::SelfDependency {
                    node_name: name.to_string(),
                });
            }

            if let Dependency::Conditional {
                node_name: target,
                output_name,
            } = dependency
            {
                self.check_conditional_dependency(
                    name,
                    dependency,
                    target,
                    output_name,
                    declarations,
                    errors,
                );
            }
        }

        let Some(signature) = signature else {
            return;
        };

        for (input_name, binding) in &declaration.inputs {
            let Some(input_sig) = signature.find_input(input_name) else {
                errors.push(CompileError::OperationMissingInput {
                    node_name: name.to_string(),
                    operation: declaration.operation.to_string(),
                    input: input_name.clone(),
                });
                continue;
            };

            match binding {
                InputBinding::Constant { value } => {
                    self.check_constant(name, input_name, input_sig.accepts_constant, &input_sig.ref_type, value, errors);
                }
                InputBinding::OutputOf {
                    node_name: source,
                    output_name,
                } => {
                    self.check_output_reference(
                        name,
                        input_name,
                        &input_sig.ref_type,
                        source,
                        output_name,
                        declarations,
                        errors,
                    );
                }
            }
        }

        for input_sig in signature.inputs() {
            if !input_sig.optional && !declaration.inputs.contains_key(&input_sig.name) {
                errors.push(CompileError::RequiredInputUnbound {
                    node_name: name.to_string(),
                    operation: declaration.operation.to_string(),
                    input: input_sig.name.clone(),
                });
            }
        }

        for (slot, binding) in &declaration.outputs {
            let Some(output_sig) = signature.find_output(slot) else {
                errors.push(CompileError::OperationMissingOutput {
                    node_name: name.to_string(),
                    operation: declaration.operation.to_string(),
                    output: slot.clone(),
                });
                continue;
            };

            if let OutputBinding::Redirect {
                node_name: target,
                input_name: target_input,
            } = binding
            {
                self.check_redirect(
                    name,
                    slot,
                    &output_sig.ref_type,
                    target,
                    target_input,
                    declarations,
                    errors,
                );
            }
        }
    }

    /// Conditional dependencies must reference a direct (non-redirected)
    /// boolean output of the target node.
    fn check_conditional_dependency(
        &self,
        name: &str,
        dependency: &Dependency,
        target: &str,
        output_name: &str,
        declarations: &BTreeMap<String, NodeDeclaration>,
        errors: &mut Vec<CompileError>,
    ) {
        let Some(target_decl) = declarations.get(target) else {
            return;
        };

        let Some(slot) = target_decl.direct_output_slot(output_name) else {
            errors.push(CompileError::ConditionalDependencyInvalidOutputRef {
                node_name: name.to_string(),
                dependency: dependency.to_string(),
            });
            return;
        };

        if let Some(target_sig) = self.registry.lookup(target_decl.operation.as_str()) {
            let boolean = target_sig
                .find_output(slot)
                .is_some_and(|output| output.ref_type == RefType::Boolean);
            if !boolean {
                errors.push(CompileError::ConditionalDependencyNotBoolean {
                    node_name: name.to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }
    }

    fn check_constant(
        &self,
        name: &str,
        input_name: &str,
        accepts_constant: bool,
        ref_type: &RefType,
        value: &Value,
        errors: &mut Vec<CompileError>,
    ) {
        if !accepts_constant {
            errors.push(CompileError::InputNotConstant {
                node_name: name.to_string(),
                input: input_name.to_string(),
            });
        } else if !ref_type.admits(value) {
            errors.push(CompileError::ConstantTypeMismatch {
                node_name: name.to_string(),
                input: input_name.to_string(),
                expected: ref_type.to_string(),
                actual: value.type_name().to_string(),
            });
        }
    }

    /// Resolves an `outputOf` reference and checks its type against the
    /// consuming input. `any` on either side matches unconditionally.
    fn check_output_reference(
        &self,
        name: &str,
        input_name: &str,
        input_type: &RefType,
        source: &str,
        output_name: &str,
        declarations: &BTreeMap<String, NodeDeclaration>,
        errors: &mut Vec<CompileError>,
    ) {
        if !declarations.contains_key(source) {
            errors.push(CompileError::InputReferenceNotFound {
                node_name: name.to_string(),
                input: input_name.to_string(),
                reference_node: source.to_string(),
            });
            return;
        }

        let resolved = match resolve_output(declarations, source, output_name) {
            Ok(resolved) => resolved,
            Err(_) => {
                errors.push(CompileError::OutputResolutionFailed {
                    node_name: name.to_string(),
                    reference_node: source.to_string(),
                    output_name: output_name.to_string(),
                });
                return;
            }
        };

        let Some(source_decl) = declarations.get(&resolved.node_name) else {
            return;
        };
        let Some(source_sig) = self.registry.lookup(source_decl.operation.as_str()) else {
            return;
        };

        match source_sig.find_output(&resolved.slot) {
            None => errors.push(CompileError::OperationMissingOutput {
                node_name: resolved.node_name.clone(),
                operation: source_decl.operation.to_string(),
                output: resolved.slot.clone(),
            }),
            Some(output_sig) if !input_type.matches(&output_sig.ref_type) => {
                errors.push(CompileError::RefInputTypeMismatch {
                    node_name: name.to_string(),
                    input: input_name.to_string(),
                    input_type: input_type.to_string(),
                    reference_node: resolved.node_name.clone(),
                    reference_output: resolved.slot.clone(),
                    output_type: output_sig.ref_type.to_string(),
                });
            }
            Some(_) => {}
        }
    }

    /// A redirected output overwrites the target input slot with a
    /// constant at run time, so the target must exist, accept constants
    /// and match the output's type.
    fn check_redirect(
        &self,
        name: &str,
        slot: &str,
        output_type: &RefType,
        target: &str,
        target_input: &str,
        declarations: &BTreeMap<String, NodeDeclaration>,
        errors: &mut Vec<CompileError>,
    ) {
        let Some(target_decl) = declarations.get(target) else {
            errors.push(CompileError::RedirectTargetNotFound {
                node_name: name.to_string(),
                output: slot.to_string(),
                target_node: target.to_string(),
            });
            return;
        };
        let Some(target_sig) = self.registry.lookup(target_decl.operation.as_str()) else {
            return;
        };

        match target_sig.find_input(target_input) {
            None => errors.push(CompileError::RedirectInputNotFound {
                node_name: name.to_string(),
                output: slot.to_string(),
                target_node: target.to_string(),
                target_input: target_input.to_string(),
            }),
            Some(input_sig) if !input_sig.accepts_constant => {
                errors.push(CompileError::RedirectNotConstant {
                    node_name: name.to_string(),
                    output: slot.to_string(),
                    target_node: target.to_string(),
                    target_input: target_input.to_string(),
                });
            }
            Some(input_sig) if !output_type.matches(&input_sig.ref_type) => {
                errors.push(CompileError::RedirectTypeMismatch {
                    node_name: name.to_string(),
                    output: slot.to_string(),
                    output_type: output_type.to_string(),
                    target_node: target.to_string(),
                    target_input: target_input.to_string(),
                    input_type: input_sig.ref_type.to_string(),
                });
            }
            Some(_) => {}
        }
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Shape validation for a single node declaration. A node that fails any
/// shape check is excluded from the base pipeline but still reported.
fn parse_node(
    name: &str,
    raw: &JsonValue,
    errors: &mut Vec<CompileError>,
) -> Option<NodeDeclaration> {
    let Some(object) = raw.as_object() else {
        errors.push(CompileError::NodeNotObject {
            node_name: name.to_string(),
        });
        return None;
    };

    let before = errors.len();
    for property in ["node", "inputs", "outputs", "dependsOn"] {
        if !object.contains_key(property) {
            errors.push(CompileError::NodeMissingProperty {
                node_name: name.to_string(),
                property: property.to_string(),
            });
        }
    }

    let operation = object.get("node").and_then(|value| match value {
        JsonValue::String(tag) => match OperationTag::parse(tag) {
            Ok(tag) => Some(tag),
            Err(_) => {
                errors.push(CompileError::NodeInvalidPropertyValue {
                    node_name: name.to_string(),
                    property: "node".to_string(),
                    expected: "`namespace::action`".to_string(),
                });
                None
            }
        },
        other => {
            errors.push(CompileError::NodeInvalidPropertyType {
                node_name: name.to_string(),
                property: "node".to_string(),
                expected: "string".to_string(),
                actual: json_type_name(other).to_string(),
            });
            None
        }
    });

    let inputs = object.get("inputs").and_then(|value| parse_inputs(name, value, errors));
    let outputs = object.get("outputs").and_then(|value| parse_outputs(name, value, errors));
    let depends_on = object
        .get("dependsOn")
        .and_then(|value| parse_depends_on(name, value, errors));

    if errors.len() > before {
        return None;
    }

    Some(NodeDeclaration {
        operation: operation?,
        inputs: inputs?,
        outputs: outputs?,
        depends_on: depends_on?,
    })
}

fn parse_inputs(
    name: &str,
    raw: &JsonValue,
    errors: &mut Vec<CompileError>,
) -> Option<BTreeMap<String, InputBinding>> {
    let Some(object) = raw.as_object() else {
        errors.push(CompileError::NodeInvalidPropertyType {
            node_name: name.to_string(),
            property: "inputs".to_string(),
            expected: "object".to_string(),
            actual: json_type_name(raw).to_string(),
        });
        return None;
    };

    let before = errors.len();
    let mut inputs = BTreeMap::new();
    for (input_name, raw_input) in object {
        let property = format!("inputs.{input_name}");
        let binding = raw_input
            .as_object()
            .and_then(|input| match input.get("type").and_then(JsonValue::as_str) {
                Some("constant") => input
                    .get("value")
                    .map(|value| InputBinding::Constant {
                        value: Value::from(value.clone()),
                    }),
                Some("outputOf") => {
                    let node_name = input.get("nodeName").and_then(JsonValue::as_str)?;
                    let output_name = input.get("outputName").and_then(JsonValue::as_str)?;
                    Some(InputBinding::OutputOf {
                        node_name: node_name.to_string(),
                        output_name: output_name.to_string(),
                    })
                }
                _ => None,
            });

        match binding {
            Some(binding) => {
                inputs.insert(input_name.clone(), binding);
            }
            None => errors.push(CompileError::NodeInvalidPropertyValue {
                node_name: name.to_string(),
                property,
                expected: "`constant` or `outputOf` binding".to_string(),
            }),
        }
    }

    (errors.len() == before).then_some(inputs)
}

fn parse_outputs(
    name: &str,
    raw: &JsonValue,
    errors: &mut Vec<CompileError>,
) -> Option<BTreeMap<String, OutputBinding>> {
    let Some(object) = raw.as_object() else {
        errors.push(CompileError::NodeInvalidPropertyType {
            node_name: name.to_string(),
            property: "outputs".to_string(),
            expected: "object".to_string(),
            actual: json_type_name(raw).to_string(),
        });
        return None;
    };

    let before = errors.len();
    let mut outputs = BTreeMap::new();
    for (output_name, raw_output) in object {
        let binding = match raw_output {
            JsonValue::String(public) => Some(OutputBinding::Named(public.clone())),
            JsonValue::Object(redirect) => {
                let node_name = redirect.get("nodeName").and_then(JsonValue::as_str);
                let input_name = redirect.get("inputName").and_then(JsonValue::as_str);
                match (node_name, input_name) {
                    (Some(node_name), Some(input_name)) => Some(OutputBinding::Redirect {
                        node_name: node_name.to_string(),
                        input_name: input_name.to_string(),
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        match binding {
            Some(binding) => {
                outputs.insert(output_name.clone(), binding);
            }
            None => errors.push(CompileError::NodeInvalidPropertyType {
                node_name: name.to_string(),
                property: format!("outputs.{output_name}"),
                expected: "string or { nodeName, inputName }".to_string(),
                actual: json_type_name(raw_output).to_string(),
            }),
        }
    }

    (errors.len() == before).then_some(outputs)
}

fn parse_depends_on(
    name: &str,
    raw: &JsonValue,
    errors: &mut Vec<CompileError>,
) -> Option<Vec<Dependency>> {
    fn parse_one(raw: &JsonValue) -> Option<Dependency> {
        match raw {
            JsonValue::String(dep) => Some(Dependency::Unconditional(dep.clone())),
            JsonValue::Object(object) => {
                let node_name = object.get("nodeName").and_then(JsonValue::as_str)?;
                let output_name = object.get("outputName").and_then(JsonValue::as_str)?;
                Some(Dependency::Conditional {
                    node_name: node_name.to_string(),
                    output_name: output_name.to_string(),
                })
            }
            _ => None,
        }
    }

    let invalid = || CompileError::NodeInvalidPropertyType {
        node_name: name.to_string(),
        property: "dependsOn".to_string(),
        expected: "dependency or array of dependencies".to_string(),
        actual: json_type_name(raw).to_string(),
    };

    match raw {
        JsonValue::Array(items) => {
            let deps: Option<Vec<_>> = items.iter().map(parse_one).collect();
            match deps {
                Some(deps) => Some(deps),
                None => {
                    errors.push(invalid());
                    None
                }
            }
        }
        other => match parse_one(other) {
            Some(dep) => Some(vec![dep]),
            None => {
                errors.push(invalid());
                None
            }
        },
    }
}

/// Normalizes surviving declarations into tree nodes, collecting
/// entrypoints and populating reverse edges. A conditional dependency
/// contributes a child edge the same as an unconditional one;
/// conditionality only affects execution.
fn build_tree(
    declarations: &BTreeMap<String, NodeDeclaration>,
) -> (BTreeMap<String, PipelineTreeNode>, Vec<String>) {
    let mut nodes: BTreeMap<String, PipelineTreeNode> = declarations
        .iter()
        .map(|(name, declaration)| {
            (
                name.clone(),
                PipelineTreeNode {
                    name: name.clone(),
                    operation: declaration.operation.clone(),
                    inputs: declaration.inputs.clone(),
                    outputs: declaration.outputs.clone(),
                    depends_on: declaration.depends_on.clone(),
                    children: Vec::new(),
                },
            )
        })
        .collect();

    let entrypoints: Vec<String> = declarations
        .iter()
        .filter(|(_, declaration)| declaration.depends_on.is_empty())
        .map(|(name, _)| name.clone())
        .collect();

    let edges: Vec<(String, String)> = declarations
        .iter()
        .flat_map(|(name, declaration)| {
            declaration
                .depends_on
                .iter()
                .map(|dependency| (dependency.node_name().to_string(), name.clone()))
        })
        .collect();

    for (parent, child) in edges {
        if let Some(parent_node) = nodes.get_mut(&parent) {
            if !parent_node.children.contains(&child) {
                parent_node.children.push(child);
            }
        }
    }

    (nodes, entrypoints)
}

/// Forward traversal from all entrypoints over reverse edges; anything
/// not visited cannot ever be scheduled.
fn find_unreachable(
    nodes: &BTreeMap<String, PipelineTreeNode>,
    entrypoints: &[String],
) -> Vec<String> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (name, node) in nodes {
        graph.add_node(name.as_str());
        for child in &node.children {
            graph.add_edge(name.as_str(), child.as_str(), ());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    for entrypoint in entrypoints {
        let mut dfs = Dfs::new(&graph, entrypoint.as_str());
        while let Some(name) = dfs.next(&graph) {
            visited.insert(name);
        }
    }

    nodes
        .keys()
        .filter(|name| !visited.contains(name.as_str()))
        .cloned()
        .collect()
}

/// DFS with a recursion stack over unconditional edges only. A cycle
/// containing at least one conditional edge is allowed: the guard can
/// break the loop at run time.
fn has_unconditional_cycle(nodes: &BTreeMap<String, PipelineTreeNode>, entrypoint: &str) -> bool {
    fn visit(
        nodes: &BTreeMap<String, PipelineTreeNode>,
        name: &str,
        visited: &mut HashSet<String>,
        stack: &mut HashSet<String>,
    ) -> bool {
        visited.insert(name.to_string());
        stack.insert(name.to_string());

        if let Some(node) = nodes.get(name) {
            for child in &node.children {
                let Some(child_node) = nodes.get(child) else {
                    continue;
                };
                let unconditional = child_node
                    .depends_on
                    .iter()
                    .any(|dep| matches!(dep, Dependency::Unconditional(dep_name) if dep_name == name));
                if !unconditional {
                    continue;
                }
                if stack.contains(child) {
                    return true;
                }
                if !visited.contains(child) && visit(nodes, child, visited, stack) {
                    return true;
                }
            }
        }

        stack.remove(name);
        false
    }

    let mut visited = HashSet::new();
    let mut stack = HashSet::new();
    visit(nodes, entrypoint, &mut visited, &mut stack)
}
