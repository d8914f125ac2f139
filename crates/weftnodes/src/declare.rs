use async_trait::async_trait;
use std::collections::HashMap;
use weftcore::{
    InputsExt, Operation, OperationContext, OperationError, OperationInputs, OperationOutputs,
    OperationSignature, RefType, Value,
};
use weftruntime::OperationLibrary;
use std::sync::Arc;

/// Typed pass-through constants. The interesting part is not the body
/// but the input slot: redirects from other nodes overwrite it, which is
/// how loop counters advance.
pub struct DeclareNumber;

#[async_trait]
impl Operation for DeclareNumber {
    fn tag(&self) -> &str {
        "declare::number"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let value = inputs.number("value")?;
        Ok(HashMap::from([("value".to_string(), Value::Number(value))]))
    }
}

pub struct DeclareBoolean;

#[async_trait]
impl Operation for DeclareBoolean {
    fn tag(&self) -> &str {
        "declare::boolean"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let value = inputs.boolean("value")?;
        Ok(HashMap::from([("value".to_string(), Value::Bool(value))]))
    }
}

pub struct DeclareString;

#[async_trait]
impl Operation for DeclareString {
    fn tag(&self) -> &str {
        "declare::string"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let value = inputs.string("value")?.to_string();
        Ok(HashMap::from([("value".to_string(), Value::String(value))]))
    }
}

pub fn signatures() -> Vec<OperationSignature> {
    vec![
        OperationSignature::new("declare", "number")
            .title("Declare a number")
            .input("value", RefType::Number)
            .output("value", RefType::Number),
        OperationSignature::new("declare", "boolean")
            .title("Declare a boolean")
            .input("value", RefType::Boolean)
            .output("value", RefType::Boolean),
        OperationSignature::new("declare", "string")
            .title("Declare a string")
            .input("value", RefType::String)
            .output("value", RefType::String),
    ]
}

pub fn register(library: &mut OperationLibrary) {
    library.register(Arc::new(DeclareNumber));
    library.register(Arc::new(DeclareBoolean));
    library.register(Arc::new(DeclareString));
}
