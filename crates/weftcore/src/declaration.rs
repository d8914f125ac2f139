use crate::Value;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Operation identifier in the form `namespace::action`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationTag(String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid operation tag `{0}`: expected `namespace::action`")]
pub struct InvalidOperationTag(pub String);

impl OperationTag {
    pub fn parse(raw: &str) -> Result<Self, InvalidOperationTag> {
        let mut parts = raw.splitn(2, "::");
        match (parts.next(), parts.next()) {
            (Some(ns), Some(action)) if !ns.is_empty() && !action.is_empty() => {
                Ok(Self(raw.to_string()))
            }
            _ => Err(InvalidOperationTag(raw.to_string())),
        }
    }

    /// Build a tag from its parts; used by signature builders where the
    /// parts are known to be non-empty literals.
    pub fn from_parts(namespace: &str, action: &str) -> Self {
        Self(format!("{namespace}::{action}"))
    }

    pub fn namespace(&self) -> &str {
        self.0.split_once("::").map(|(ns, _)| ns).unwrap_or(&self.0)
    }

    pub fn action(&self) -> &str {
        self.0.split_once("::").map(|(_, a)| a).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OperationTag {
    type Error = InvalidOperationTag;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<OperationTag> for String {
    fn from(tag: OperationTag) -> Self {
        tag.0
    }
}

/// How a node input receives its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputBinding {
    Constant { value: Value },
    #[serde(rename_all = "camelCase")]
    OutputOf {
        node_name: String,
        output_name: String,
    },
}

/// How a node result field is exposed: either published under a local
/// name, or redirected into another node's input slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputBinding {
    Named(String),
    #[serde(rename_all = "camelCase")]
    Redirect {
        node_name: String,
        input_name: String,
    },
}

/// Dependency edge: unconditional ordering, or gated on a boolean output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    Unconditional(String),
    #[serde(rename_all = "camelCase")]
    Conditional {
        node_name: String,
        output_name: String,
    },
}

impl Dependency {
    pub fn node_name(&self) -> &str {
        match self {
            Dependency::Unconditional(name) => name,
            Dependency::Conditional { node_name, .. } => node_name,
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, Dependency::Conditional { .. })
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Unconditional(name) => f.write_str(name),
            Dependency::Conditional {
                node_name,
                output_name,
            } => write!(f, "{node_name}.{output_name}"),
        }
    }
}

/// A validated node declaration with normalized dependencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDeclaration {
    #[serde(rename = "node")]
    pub operation: OperationTag,
    pub inputs: BTreeMap<String, InputBinding>,
    pub outputs: BTreeMap<String, OutputBinding>,
    #[serde(rename = "dependsOn", deserialize_with = "one_or_many")]
    pub depends_on: Vec<Dependency>,
}

impl NodeDeclaration {
    /// Finds the result-slot key that publishes `output_name` directly
    pub fn direct_output_slot(&self, output_name: &str) -> Option<&str> {
        self.outputs.iter().find_map(|(slot, binding)| match binding {
            OutputBinding::Named(name) if name == output_name => Some(slot.as_str()),
            _ => None,
        })
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Dependency>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Dependency),
        Many(Vec<Dependency>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(dep) => vec![dep],
        OneOrMany::Many(deps) => deps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_parsing() {
        let tag = OperationTag::parse("logic::add").unwrap();
        assert_eq!(tag.namespace(), "logic");
        assert_eq!(tag.action(), "add");
        assert!(OperationTag::parse("logic").is_err());
        assert!(OperationTag::parse("::add").is_err());
    }

    #[test]
    fn declaration_wire_format() {
        let raw = serde_json::json!({
            "node": "logic::subtract",
            "inputs": {
                "a": { "type": "outputOf", "nodeName": "counter", "outputName": "value" },
                "b": { "type": "constant", "value": 1 }
            },
            "outputs": { "result": { "nodeName": "counter", "inputName": "value" } },
            "dependsOn": "counter"
        });
        let decl: NodeDeclaration = serde_json::from_value(raw).unwrap();
        assert_eq!(decl.operation.as_str(), "logic::subtract");
        assert_eq!(decl.depends_on, vec![Dependency::Unconditional("counter".into())]);
        assert!(matches!(
            decl.outputs.get("result"),
            Some(OutputBinding::Redirect { .. })
        ));
    }

    #[test]
    fn conditional_dependency_wire_format() {
        let raw = serde_json::json!([
            "decrement",
            { "nodeName": "check", "outputName": "result" }
        ]);
        let deps: Vec<Dependency> = serde_json::from_value(raw).unwrap();
        assert!(!deps[0].is_conditional());
        assert!(deps[1].is_conditional());
        assert_eq!(deps[1].node_name(), "check");
    }
}
