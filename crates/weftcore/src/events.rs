use crate::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

pub type EvaluationId = Uuid;
pub type ThreadId = Uuid;

/// Lifecycle events emitted while a pipeline evaluation runs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PipelineEvent {
    ThreadStarted {
        evaluation_id: EvaluationId,
        thread_id: ThreadId,
        entrypoint: String,
        timestamp: DateTime<Utc>,
    },
    ThreadCompleted {
        evaluation_id: EvaluationId,
        thread_id: ThreadId,
        entrypoint: String,
        timestamp: DateTime<Utc>,
    },
    ThreadFailed {
        evaluation_id: EvaluationId,
        thread_id: ThreadId,
        entrypoint: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        thread_id: ThreadId,
        node: String,
        operation: String,
        timestamp: DateTime<Utc>,
    },
    NodeCompleted {
        thread_id: ThreadId,
        node: String,
        outputs: HashMap<String, Value>,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        thread_id: ThreadId,
        node: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A conditional gate evaluated to false and the node was skipped
    NodeSkipped {
        thread_id: ThreadId,
        node: String,
        gate_node: String,
        gate_output: String,
        timestamp: DateTime<Utc>,
    },
    ChildStarted {
        thread_id: ThreadId,
        parent: String,
        child: String,
        timestamp: DateTime<Utc>,
    },
    ChildFinished {
        thread_id: ThreadId,
        parent: String,
        child: String,
        timestamp: DateTime<Utc>,
    },
    /// Free-form message emitted by an operation body
    NodeMessage {
        thread_id: ThreadId,
        node: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for lifecycle events. Emitting with no subscribers is
/// not an error.
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, thread_id: ThreadId, node: impl Into<String>) -> EventEmitter {
        EventEmitter {
            thread_id,
            node: node.into(),
            sender: self.sender.clone(),
        }
    }
}

/// Per-node emitter handed to operation bodies
#[derive(Clone)]
pub struct EventEmitter {
    thread_id: ThreadId,
    node: String,
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventEmitter {
    pub fn message(&self, message: impl Into<String>) {
        let _ = self.sender.send(PipelineEvent::NodeMessage {
            thread_id: self.thread_id,
            node: self.node.clone(),
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}
