use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use weftcore::{
    InputsExt, Operation, OperationContext, OperationError, OperationInputs, OperationOutputs,
    OperationSignature, RefType, Value,
};
use weftruntime::OperationLibrary;

/// Sleeps for the requested number of milliseconds, waking early if the
/// run is cancelled
struct Delay;

#[async_trait]
impl Operation for Delay {
    fn tag(&self) -> &str {
        "time::delay"
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let milliseconds = inputs.number("milliseconds")?;
        if milliseconds < 0.0 {
            return Err(OperationError::ExecutionFailed(
                "delay must be non-negative".into(),
            ));
        }

        tokio::select! {
            _ = sleep(Duration::from_millis(milliseconds as u64)) => Ok(HashMap::new()),
            _ = ctx.cancellation.cancelled() => Err(OperationError::Cancelled),
        }
    }
}

struct Now;

#[async_trait]
impl Operation for Now {
    fn tag(&self) -> &str {
        "time::now"
    }

    async fn invoke(
        &self,
        _inputs: OperationInputs,
        _ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let timestamp = Utc::now().timestamp_millis() as f64;
        Ok(HashMap::from([(
            "timestamp".to_string(),
            Value::Number(timestamp),
        )]))
    }
}

pub fn signatures() -> Vec<OperationSignature> {
    vec![
        OperationSignature::new("time", "delay")
            .title("Delay")
            .input("milliseconds", RefType::Number),
        OperationSignature::new("time", "now")
            .title("Current time")
            .output("timestamp", RefType::Number),
    ]
}

pub fn register(library: &mut OperationLibrary) {
    library.register(Arc::new(Delay));
    library.register(Arc::new(Now));
}
