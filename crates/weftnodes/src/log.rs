use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use weftcore::{
    InputsExt, Operation, OperationContext, OperationError, OperationInputs, OperationOutputs,
    OperationSignature, RefType,
};
use weftruntime::OperationLibrary;

#[derive(Clone, Copy)]
enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Emits the message through both the tracing subscriber and the run's
/// event feed, so embedders see it regardless of which sink they watch.
struct Log {
    tag: &'static str,
    level: Level,
}

#[async_trait]
impl Operation for Log {
    fn tag(&self) -> &str {
        self.tag
    }

    async fn invoke(
        &self,
        inputs: OperationInputs,
        ctx: OperationContext,
    ) -> Result<OperationOutputs, OperationError> {
        let message = inputs.require("message")?.to_string();
        let node = ctx.events.node();
        match self.level {
            Level::Debug => tracing::debug!(%node, "{message}"),
            Level::Info => tracing::info!(%node, "{message}"),
            Level::Warn => tracing::warn!(%node, "{message}"),
            Level::Error => tracing::error!(%node, "{message}"),
        }
        ctx.events.message(message);
        Ok(HashMap::new())
    }
}

fn signature(action: &str, title: &str) -> OperationSignature {
    OperationSignature::new("log", action)
        .title(title)
        .input("message", RefType::Any)
}

pub fn signatures() -> Vec<OperationSignature> {
    vec![
        signature("debug", "Log at debug level"),
        signature("info", "Log at info level"),
        signature("warn", "Log at warn level"),
        signature("error", "Log at error level"),
    ]
}

pub fn register(library: &mut OperationLibrary) {
    library.register(Arc::new(Log { tag: "log::debug", level: Level::Debug }));
    library.register(Arc::new(Log { tag: "log::info", level: Level::Info }));
    library.register(Arc::new(Log { tag: "log::warn", level: Level::Warn }));
    library.register(Arc::new(Log { tag: "log::error", level: Level::Error }));
}
