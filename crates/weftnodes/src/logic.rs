use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use weftcore::{
    InputsExt, Operation, OperationContext, OperationError, OperationInputs, OperationOutputs,
    OperationSignature, RefType, Value,
};
use weftruntime::OperationLibrary;

/// Binary numeric operation; `apply` may fail (division by zero)
struct Arithmetic {
    tag: &'static str,
    apply: fn(f64, f64) -> Result<f64, OperationError>,
}

#[async_trait]
impl Operation for Arithmetic {
    fn tag(&self) -> &str {
        self.tag
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let result = (self.apply)(inputs.number("a")?, inputs.number("b")?)?;
        Ok(HashMap::from([("result".to_string(), Value::Number(result))]))
    }
}

/// Numeric comparison producing a boolean
struct Comparison {
    tag: &'static str,
    apply: fn(f64, f64) -> bool,
}

#[async_trait]
impl Operation for Comparison {
    fn tag(&self) -> &str {
        self.tag
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let result = (self.apply)(inputs.number("a")?, inputs.number("b")?);
        Ok(HashMap::from([("result".to_string(), Value::Bool(result))]))
    }
}

/// Structural equality over arbitrary values
struct Equality {
    tag: &'static str,
    negate: bool,
}

#[async_trait]
impl Operation for Equality {
    fn tag(&self) -> &str {
        self.tag
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let equal = inputs.require("a")? == inputs.require("b")?;
        Ok(HashMap::from([(
            "result".to_string(),
            Value::Bool(equal != self.negate),
        )]))
    }
}

struct BoolBinary {
    tag: &'static str,
    apply: fn(bool, bool) -> bool,
}

#[async_trait]
impl Operation for BoolBinary {
    fn tag(&self) -> &str {
        self.tag
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let result = (self.apply)(inputs.boolean("a")?, inputs.boolean("b")?);
        Ok(HashMap::from([("result".to_string(), Value::Bool(result))]))
    }
}

struct Negate;

#[async_trait]
impl Operation for Negate {
    fn tag(&self) -> &str {
        "logic::negate"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let value = inputs.number("value")?;
        Ok(HashMap::from([("result".to_string(), Value::Number(-value))]))
    }
}

struct Not;

#[async_trait]
impl Operation for Not {
    fn tag(&self) -> &str {
        "logic::not"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let value = inputs.boolean("value")?;
        Ok(HashMap::from([("result".to_string(), Value::Bool(!value))]))
    }
}

fn divide(a: f64, b: f64) -> Result<f64, OperationError> {
    if b == 0.0 {
        return Err(OperationError::ExecutionFailed("division by zero".into()));
    }
    Ok(a / b)
}

fn modulus(a: f64, b: f64) -> Result<f64, OperationError> {
    if b == 0.0 {
        return Err(OperationError::ExecutionFailed("modulus by zero".into()));
    }
    Ok(a % b)
}

fn arithmetic_signature(action: &str, title: &str) -> OperationSignature {
    OperationSignature::new("logic", action)
        .title(title)
        .input("a", RefType::Number)
        .input("b", RefType::Number)
        .output("result", RefType::Number)
}

fn comparison_signature(action: &str, title: &str) -> OperationSignature {
    OperationSignature::new("logic", action)
        .title(title)
        .input("a", RefType::Number)
        .input("b", RefType::Number)
        .output("result", RefType::Boolean)
}

fn boolean_signature(action: &str, title: &str) -> OperationSignature {
    OperationSignature::new("logic", action)
        .title(title)
        .input("a", RefType::Boolean)
        .input("b", RefType::Boolean)
        .output("result", RefType::Boolean)
}

pub fn signatures() -> Vec<OperationSignature> {
    vec![
        arithmetic_signature("add", "Add"),
        arithmetic_signature("subtract", "Subtract"),
        arithmetic_signature("multiply", "Multiply"),
        arithmetic_signature("divide", "Divide"),
        arithmetic_signature("modulus", "Modulus"),
        OperationSignature::new("logic", "negate")
            .title("Negate")
            .input("value", RefType::Number)
            .output("result", RefType::Number),
        comparison_signature("greaterThan", "Greater than"),
        comparison_signature("greaterThanOrEqual", "Greater than or equal"),
        comparison_signature("lessThan", "Less than"),
        comparison_signature("lessThanOrEqual", "Less than or equal"),
        OperationSignature::new("logic", "equal")
            .title("Equal")
            .input("a", RefType::Any)
            .input("b", RefType::Any)
            .output("result", RefType::Boolean),
        OperationSignature::new("logic", "notEqual")
            .title("Not equal")
            .input("a", RefType::Any)
            .input("b", RefType::Any)
            .output("result", RefType::Boolean),
        boolean_signature("and", "And"),
        boolean_signature("or", "Or"),
        OperationSignature::new("logic", "not")
            .title("Not")
            .input("value", RefType::Boolean)
            .output("result", RefType::Boolean),
    ]
}

pub fn register(library: &mut OperationLibrary) {
    library.register(Arc::new(Arithmetic { tag: "logic::add", apply: |a, b| Ok(a + b) }));
    library.register(Arc::new(Arithmetic { tag: "logic::subtract", apply: |a, b| Ok(a - b) }));
    library.register(Arc::new(Arithmetic { tag: "logic::multiply", apply: |a, b| Ok(a * b) }));
    library.register(Arc::new(Arithmetic { tag: "logic::divide", apply: divide }));
    library.register(Arc::new(Arithmetic { tag: "logic::modulus", apply: modulus }));
    library.register(Arc::new(Negate));
    library.register(Arc::new(Comparison { tag: "logic::greaterThan", apply: |a, b| a > b }));
    library.register(Arc::new(Comparison {
        tag: "logic::greaterThanOrEqual",
        apply: |a, b| a >= b,
    }));
    library.register(Arc::new(Comparison { tag: "logic::lessThan", apply: |a, b| a < b }));
    library.register(Arc::new(Comparison {
        tag: "logic::lessThanOrEqual",
        apply: |a, b| a <= b,
    }));
    library.register(Arc::new(Equality { tag: "logic::equal", negate: false }));
    library.register(Arc::new(Equality { tag: "logic::notEqual", negate: true }));
    library.register(Arc::new(BoolBinary { tag: "logic::and", apply: |a, b| a && b }));
    library.register(Arc::new(BoolBinary { tag: "logic::or", apply: |a, b| a || b }));
    library.register(Arc::new(Not));
}
