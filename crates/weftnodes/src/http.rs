use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use weftcore::{
    InputsExt, Operation, OperationContext, OperationError, OperationInputs, OperationOutputs,
    OperationSignature, RefType, Value,
};
use weftruntime::OperationLibrary;

/// HTTP GET. The client is owned by the operation and reused across
/// invocations; responses are read fully, so there is nothing to
/// finalize.
pub struct HttpGet {
    client: reqwest::Client,
}

impl HttpGet {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpGet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for HttpGet {
    fn tag(&self) -> &str {
        "http::get"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let url = inputs.string("url")?;
        tracing::debug!(%url, "GET");

        let request = self.client.get(url).send();
        let response = tokio::select! {
            response = request => response,
            _ = ctx.cancellation.cancelled() => return Err(OperationError::Cancelled),
        }
        .map_err(|error| OperationError::ExecutionFailed(format!("request failed: {error}")))?;

        let status = response.status().as_u16() as f64;
        let body = response
            .text()
            .await
            .map_err(|error| OperationError::ExecutionFailed(format!("body read failed: {error}")))?;

        Ok(HashMap::from([
            ("status".to_string(), Value::Number(status)),
            ("body".to_string(), Value::String(body)),
        ]))
    }
}

pub fn signatures() -> Vec<OperationSignature> {
    vec![OperationSignature::new("http", "get")
        .title("HTTP GET")
        .input("url", RefType::String)
        .output("status", RefType::Number)
        .output("body", RefType::String)]
}

pub fn register(library: &mut OperationLibrary) {
    library.register(Arc::new(HttpGet::new()));
}
