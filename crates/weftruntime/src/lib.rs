//! Pipeline compiler and execution engine
//!
//! The compiler validates a raw graph against a signature registry and
//! produces an immutable [`Pipeline`]. Binding a pipeline to an
//! [`OperationLibrary`] yields an [`Evaluation`], which runs each
//! entrypoint as an independent thread of cooperative, memoized node
//! executions.

mod compiler;
mod evaluation;
mod library;
mod pipeline;
mod plan;
mod resolver;

pub use compiler::{CompileResult, PipelineCompiler};
pub use evaluation::{Evaluation, EvaluationConfig, PipelineThread, ThreadState};
pub use library::OperationLibrary;
pub use pipeline::{Pipeline, PipelineTreeNode};
pub use plan::{ExecutionPlan, ProcedureSpec};
pub use resolver::{resolve_output, ResolveError, ResolvedOutput};
