use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use weftcore::{
    InputsExt, Operation, OperationContext, OperationError, OperationInputs, OperationOutputs,
    OperationSignature, RefType, Value,
};
use weftruntime::OperationLibrary;

struct Length;

#[async_trait]
impl Operation for Length {
    fn tag(&self) -> &str {
        "list::length"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let length = inputs.array("value")?.len() as f64;
        Ok(HashMap::from([("result".to_string(), Value::Number(length))]))
    }
}

struct Get;

#[async_trait]
impl Operation for Get {
    fn tag(&self) -> &str {
        "list::get"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let items = inputs.array("value")?;
        let index = inputs.number("index")?;
        if index < 0.0 || index.fract() != 0.0 {
            return Err(OperationError::ExecutionFailed(format!(
                "index {index} is not a non-negative integer"
            )));
        }
        let item = items.get(index as usize).ok_or_else(|| {
            OperationError::ExecutionFailed(format!(
                "index {index} out of bounds for list of {}",
                items.len()
            ))
        })?;
        Ok(HashMap::from([("result".to_string(), item.clone())]))
    }
}

struct Append;

#[async_trait]
impl Operation for Append {
    fn tag(&self) -> &str {
        "list::append"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let mut items = inputs.array("value")?.to_vec();
        items.push(inputs.require("item")?.clone());
        Ok(HashMap::from([("result".to_string(), Value::Array(items))]))
    }
}

struct Join;

#[async_trait]
impl Operation for Join {
    fn tag(&self) -> &str {
        "list::join"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let separator = inputs.string("separator")?;
        let joined = inputs
            .array("value")?
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(separator);
        Ok(HashMap::from([("result".to_string(), Value::String(joined))]))
    }
}

pub fn signatures() -> Vec<OperationSignature> {
    vec![
        OperationSignature::new("list", "length")
            .title("List length")
            .input("value", RefType::Any)
            .output("result", RefType::Number),
        OperationSignature::new("list", "get")
            .title("Get list item")
            .input("value", RefType::Any)
            .input("index", RefType::Number)
            .output("result", RefType::Any),
        OperationSignature::new("list", "append")
            .title("Append to list")
            .input("value", RefType::Any)
            .input("item", RefType::Any)
            .output("result", RefType::Any),
        OperationSignature::new("list", "join")
            .title("Join list items")
            .input("value", RefType::Any)
            .input("separator", RefType::String)
            .output("result", RefType::String),
    ]
}

pub fn register(library: &mut OperationLibrary) {
    library.register(Arc::new(Length));
    library.register(Arc::new(Get));
    library.register(Arc::new(Append));
    library.register(Arc::new(Join));
}
