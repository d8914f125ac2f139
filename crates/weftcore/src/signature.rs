use crate::{OperationTag, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Reference type of an input or output slot. `Any` matches everything;
/// `Handle` is a domain-specific opaque resource type that can only flow
/// between slots of the same handle name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    Number,
    Boolean,
    String,
    Any,
    Handle(String),
}

impl RefType {
    pub fn handle(name: impl Into<String>) -> Self {
        RefType::Handle(name.into())
    }

    /// Type compatibility between a producing and a consuming slot
    pub fn matches(&self, other: &RefType) -> bool {
        self == &RefType::Any || other == &RefType::Any || self == other
    }

    /// Whether a constant value is admissible for a slot of this type.
    /// Handles are acquired at runtime and never representable as constants.
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            RefType::Any => true,
            RefType::Number => matches!(value, Value::Number(_)),
            RefType::Boolean => matches!(value, Value::Bool(_)),
            RefType::String => matches!(value, Value::String(_)),
            RefType::Handle(_) => false,
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefType::Number => f.write_str("number"),
            RefType::Boolean => f.write_str("boolean"),
            RefType::String => f.write_str("string"),
            RefType::Any => f.write_str("any"),
            RefType::Handle(name) => write!(f, "{name}&"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSignature {
    pub name: String,
    pub ref_type: RefType,
    pub optional: bool,
    pub accepts_constant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSignature {
    pub name: String,
    pub ref_type: RefType,
}

/// Declared type signature of one operation. Built through the chainable
/// registration API; no reflection involved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSignature {
    tag: OperationTag,
    title: String,
    description: Option<String>,
    inputs: Vec<InputSignature>,
    outputs: Vec<OutputSignature>,
}

impl OperationSignature {
    pub fn new(namespace: &str, action: &str) -> Self {
        Self {
            tag: OperationTag::from_parts(namespace, action),
            title: String::new(),
            description: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Required input that accepts both constants and output references
    pub fn input(mut self, name: impl Into<String>, ref_type: RefType) -> Self {
        self.inputs.push(InputSignature {
            name: name.into(),
            ref_type,
            optional: false,
            accepts_constant: true,
        });
        self
    }

    pub fn optional_input(mut self, name: impl Into<String>, ref_type: RefType) -> Self {
        self.inputs.push(InputSignature {
            name: name.into(),
            ref_type,
            optional: true,
            accepts_constant: true,
        });
        self
    }

    /// Input satisfiable only by an output reference, never a constant
    pub fn ref_input(mut self, name: impl Into<String>, ref_type: RefType) -> Self {
        self.inputs.push(InputSignature {
            name: name.into(),
            ref_type,
            optional: false,
            accepts_constant: false,
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>, ref_type: RefType) -> Self {
        self.outputs.push(OutputSignature {
            name: name.into(),
            ref_type,
        });
        self
    }

    pub fn tag(&self) -> &OperationTag {
        &self.tag
    }

    pub fn title_str(&self) -> &str {
        &self.title
    }

    pub fn description_str(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn find_input(&self, name: &str) -> Option<&InputSignature> {
        self.inputs.iter().find(|input| input.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&OutputSignature> {
        self.outputs.iter().find(|output| output.name == name)
    }

    pub fn inputs(&self) -> &[InputSignature] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputSignature] {
        &self.outputs
    }
}

/// Registry of operation type signatures, queried by the compiler
#[derive(Debug, Default, Clone)]
pub struct SignatureRegistry {
    signatures: HashMap<String, OperationSignature>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, signature: OperationSignature) {
        tracing::debug!(tag = %signature.tag(), "registering operation signature");
        self.signatures
            .insert(signature.tag().as_str().to_string(), signature);
    }

    pub fn lookup(&self, tag: &str) -> Option<&OperationSignature> {
        self.signatures.get(tag)
    }

    /// All registered signatures, sorted by tag for stable listings
    pub fn signatures(&self) -> Vec<&OperationSignature> {
        let mut all: Vec<_> = self.signatures.values().collect();
        all.sort_by(|a, b| a.tag().cmp(b.tag()));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_type_matching() {
        assert!(RefType::Any.matches(&RefType::Number));
        assert!(RefType::Number.matches(&RefType::Any));
        assert!(RefType::Number.matches(&RefType::Number));
        assert!(!RefType::Number.matches(&RefType::Boolean));
        assert!(!RefType::handle("page").matches(&RefType::handle("browser")));
        assert!(RefType::handle("page").matches(&RefType::handle("page")));
    }

    #[test]
    fn constants_admissibility() {
        assert!(RefType::Number.admits(&Value::Number(1.0)));
        assert!(!RefType::Number.admits(&Value::Bool(true)));
        assert!(RefType::Any.admits(&Value::Null));
        assert!(!RefType::handle("page").admits(&Value::String("p".into())));
    }

    #[test]
    fn builder_and_lookup() {
        let mut registry = SignatureRegistry::new();
        registry.register(
            OperationSignature::new("logic", "add")
                .title("Add")
                .input("a", RefType::Number)
                .input("b", RefType::Number)
                .output("result", RefType::Number),
        );
        let signature = registry.lookup("logic::add").unwrap();
        assert_eq!(signature.find_input("a").unwrap().ref_type, RefType::Number);
        assert!(signature.find_input("c").is_none());
        assert_eq!(signature.find_output("result").unwrap().ref_type, RefType::Number);
    }
}
