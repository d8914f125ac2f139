use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use weftcore::{
    InputsExt, Operation, OperationContext, OperationError, OperationInputs, OperationOutputs,
    OperationSignature, RefType, Value,
};
use weftruntime::OperationLibrary;

struct Concat;

#[async_trait]
impl Operation for Concat {
    fn tag(&self) -> &str {
        "string::concat"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let result = format!("{}{}", inputs.string("a")?, inputs.string("b")?);
        Ok(HashMap::from([("result".to_string(), Value::String(result))]))
    }
}

struct Length;

#[async_trait]
impl Operation for Length {
    fn tag(&self) -> &str {
        "string::length"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let length = inputs.string("value")?.chars().count() as f64;
        Ok(HashMap::from([("result".to_string(), Value::Number(length))]))
    }
}

struct Contains;

#[async_trait]
impl Operation for Contains {
    fn tag(&self) -> &str {
        "string::contains"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let result = inputs.string("value")?.contains(inputs.string("needle")?);
        Ok(HashMap::from([("result".to_string(), Value::Bool(result))]))
    }
}

/// Case mapping shared by toUpperCase/toLowerCase
struct MapCase {
    tag: &'static str,
    upper: bool,
}

#[async_trait]
impl Operation for MapCase {
    fn tag(&self) -> &str {
        self.tag
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let value = inputs.string("value")?;
        let result = if self.upper {
            value.to_uppercase()
        } else {
            value.to_lowercase()
        };
        Ok(HashMap::from([("result".to_string(), Value::String(result))]))
    }
}

pub fn signatures() -> Vec<OperationSignature> {
    vec![
        OperationSignature::new("string", "concat")
            .title("Concatenate strings")
            .input("a", RefType::String)
            .input("b", RefType::String)
            .output("result", RefType::String),
        OperationSignature::new("string", "length")
            .title("String length")
            .input("value", RefType::String)
            .output("result", RefType::Number),
        OperationSignature::new("string", "contains")
            .title("String contains")
            .input("value", RefType::String)
            .input("needle", RefType::String)
            .output("result", RefType::Boolean),
        OperationSignature::new("string", "toUpperCase")
            .title("Upper case")
            .input("value", RefType::String)
            .output("result", RefType::String),
        OperationSignature::new("string", "toLowerCase")
            .title("Lower case")
            .input("value", RefType::String)
            .output("result", RefType::String),
    ]
}

pub fn register(library: &mut OperationLibrary) {
    library.register(Arc::new(Concat));
    library.register(Arc::new(Length));
    library.register(Arc::new(Contains));
    library.register(Arc::new(MapCase { tag: "string::toUpperCase", upper: true }));
    library.register(Arc::new(MapCase { tag: "string::toLowerCase", upper: false }));
}
