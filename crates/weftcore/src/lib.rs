//! Core abstractions for the weft pipeline engine
//!
//! This crate provides the fundamental types that the compiler, runtime
//! and operation packages depend on: the value model, the declaration
//! model, compile diagnostics, the signature registry, the operation
//! trait and the per-run finalizer scope.

mod declaration;
mod diagnostics;
mod error;
pub mod events;
mod gc;
mod operation;
mod signature;
mod value;

pub use declaration::{
    Dependency, InputBinding, InvalidOperationTag, NodeDeclaration, OperationTag, OutputBinding,
};
pub use diagnostics::CompileError;
pub use error::{EvalError, OperationError};
pub use events::{EvaluationId, EventBus, EventEmitter, PipelineEvent, ThreadId};
pub use gc::FinalizerScope;
pub use operation::{
    InputsExt, NodeOutputs, Operation, OperationContext, OperationInputs, OperationOutputs,
    OutputStore,
};
pub use signature::{
    InputSignature, OperationSignature, OutputSignature, RefType, SignatureRegistry,
};
pub use value::Value;
