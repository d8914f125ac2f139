use crate::library::OperationLibrary;
use crate::pipeline::Pipeline;
use crate::plan::{ExecutionPlan, ProcedureSpec};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, Stream, StreamExt};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use weftcore::{
    EvalError, EvaluationId, EventBus, FinalizerScope, InputBinding, NodeOutputs,
    OperationContext, OperationError, OperationInputs, OperationOutputs, OutputBinding,
    OutputStore, PipelineEvent, ThreadId, Value,
};

/// Runtime knobs for an evaluation
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Capacity of the lifecycle event channel
    pub event_buffer_size: usize,
    /// Upper bound on cascade recursion depth. Looping graphs consume
    /// depth on every iteration, so this also bounds iteration count.
    pub max_cascade_depth: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1024,
            max_cascade_depth: 10_000,
        }
    }
}

/// Terminal state of one entrypoint's run
#[derive(Debug, Clone)]
pub enum ThreadState {
    Pending,
    Complete(HashMap<String, NodeOutputs>),
    Error(EvalError),
}

/// One entrypoint's run. Yielded by [`Evaluation::evaluate`] once the
/// run has reached a terminal state.
#[derive(Debug, Clone)]
pub struct PipelineThread {
    pub id: ThreadId,
    pub entrypoint: String,
    pub state: ThreadState,
}

impl PipelineThread {
    /// Re-raises the thread's failure, or hands back the final output
    /// store snapshot. A pending thread has produced nothing yet.
    pub fn into_result(self) -> Result<HashMap<String, NodeOutputs>, EvalError> {
        match self.state {
            ThreadState::Complete(outputs) => Ok(outputs),
            ThreadState::Error(error) => Err(error),
            ThreadState::Pending => Ok(HashMap::new()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, ThreadState::Error(_))
    }
}

/// A compiled pipeline bound to an operation library, ready to run.
///
/// Construction installs one execution plan per entrypoint; the
/// procedures are interpreted rather than code-generated, so an
/// evaluation is reusable and cheap to build. Each call to
/// [`evaluate`](Self::evaluate) starts from a fresh output store.
pub struct Evaluation {
    evaluation_id: EvaluationId,
    plans: Vec<ExecutionPlan>,
    library: OperationLibrary,
    config: EvaluationConfig,
    events: EventBus,
}

impl Evaluation {
    pub(crate) fn new(pipeline: &Pipeline, library: OperationLibrary, config: EvaluationConfig) -> Self {
        let plans = pipeline
            .entrypoints()
            .iter()
            .map(|entrypoint| ExecutionPlan::build(pipeline, entrypoint))
            .collect();
        let events = EventBus::new(config.event_buffer_size);
        Self {
            evaluation_id: Uuid::new_v4(),
            plans,
            library,
            config,
            events,
        }
    }

    pub fn id(&self) -> EvaluationId {
        self.evaluation_id
    }

    /// Subscribes to the lifecycle event feed. Subscribe before calling
    /// `evaluate`; the channel drops events emitted with no receiver.
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Runs every entrypoint in declaration order, yielding one terminal
    /// thread per entrypoint. A failing entrypoint does not stop its
    /// siblings.
    pub fn evaluate(&self, signal: CancellationToken) -> impl Stream<Item = PipelineThread> + '_ {
        stream::unfold(0usize, move |index| {
            let signal = signal.clone();
            async move {
                let plan = self.plans.get(index)?;
                let thread = self.run_entrypoint(plan, signal).await;
                Some((thread, index + 1))
            }
        })
    }

    /// Drives all entrypoints to completion and collects the threads
    pub async fn evaluate_to_end(&self, signal: CancellationToken) -> Vec<PipelineThread> {
        self.evaluate(signal).collect().await
    }

    async fn run_entrypoint(&self, plan: &ExecutionPlan, signal: CancellationToken) -> PipelineThread {
        let thread_id = Uuid::new_v4();
        let entrypoint = plan.entrypoint().to_string();
        tracing::debug!(%thread_id, %entrypoint, "thread started");
        self.events.emit(PipelineEvent::ThreadStarted {
            evaluation_id: self.evaluation_id,
            thread_id,
            entrypoint: entrypoint.clone(),
            timestamp: Utc::now(),
        });

        let gc = FinalizerScope::new();
        let mut runtime = EvaluationRuntime::new(
            plan,
            &self.library,
            &self.events,
            gc.clone(),
            thread_id,
            self.config.max_cascade_depth,
            signal,
        );

        let result = runtime.run_node(&entrypoint, false, 0).await;
        let store = runtime.into_store();

        // Finalizers run on every exit path, including failure
        gc.collect().await;

        match result {
            Ok(()) => {
                self.events.emit(PipelineEvent::ThreadCompleted {
                    evaluation_id: self.evaluation_id,
                    thread_id,
                    entrypoint: entrypoint.clone(),
                    timestamp: Utc::now(),
                });
                PipelineThread {
                    id: thread_id,
                    entrypoint,
                    state: ThreadState::Complete(store.snapshot()),
                }
            }
            Err(error) => {
                tracing::debug!(%thread_id, %entrypoint, %error, "thread failed");
                self.events.emit(PipelineEvent::ThreadFailed {
                    evaluation_id: self.evaluation_id,
                    thread_id,
                    entrypoint: entrypoint.clone(),
                    error: error.to_string(),
                    timestamp: Utc::now(),
                });
                PipelineThread {
                    id: thread_id,
                    entrypoint,
                    state: ThreadState::Error(error),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Complete,
    Error,
}

/// Mutable state of one run: the cooperative scheduler that interprets
/// the plan's procedures. Never shared between runs.
struct EvaluationRuntime<'a> {
    plan: &'a ExecutionPlan,
    library: &'a OperationLibrary,
    events: &'a EventBus,
    gc: FinalizerScope,
    thread_id: ThreadId,
    max_cascade_depth: usize,
    signal: CancellationToken,
    store: OutputStore,
    states: HashMap<String, NodeState>,
    /// Nodes whose procedure is currently on the call stack
    running: HashSet<String>,
    /// Running nodes invalidated mid-flight; they stay re-runnable
    /// instead of memoizing on completion
    dirty_while_running: HashSet<String>,
    /// Nodes whose outputs changed since their readers last pulled them
    input_dirty: HashSet<String>,
    /// Redirected input values, per target node. Checked before the
    /// declared binding when inputs are resolved.
    overrides: HashMap<String, HashMap<String, Value>>,
}

impl<'a> EvaluationRuntime<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        plan: &'a ExecutionPlan,
        library: &'a OperationLibrary,
        events: &'a EventBus,
        gc: FinalizerScope,
        thread_id: ThreadId,
        max_cascade_depth: usize,
        signal: CancellationToken,
    ) -> Self {
        Self {
            plan,
            library,
            events,
            gc,
            thread_id,
            max_cascade_depth,
            signal,
            store: OutputStore::new(),
            states: HashMap::new(),
            running: HashSet::new(),
            dirty_while_running: HashSet::new(),
            input_dirty: HashSet::new(),
            overrides: HashMap::new(),
        }
    }

    fn into_store(self) -> OutputStore {
        self.store
    }

    /// Runs one node and, unless `dependency_only`, cascades into its
    /// children. Re-entrant calls into a node already on the stack are
    /// no-ops; looping graphs rely on this to terminate each tick.
    fn run_node<'s>(
        &'s mut self,
        name: &str,
        dependency_only: bool,
        depth: usize,
    ) -> BoxFuture<'s, Result<(), EvalError>> {
        let name = name.to_string();
        async move {
            if depth > self.max_cascade_depth {
                return Err(EvalError::CascadeDepthExceeded {
                    limit: self.max_cascade_depth,
                });
            }
            if self.running.contains(&name) {
                return Ok(());
            }
            if self.signal.is_cancelled() {
                return Err(EvalError::Cancelled);
            }

            let spec = self
                .plan
                .procedure(&name)
                .ok_or_else(|| EvalError::ProcedureNotFound { node: name.clone() })?
                .clone();

            // A false gate short-circuits the whole node, memoized or not
            for (gate_node, gate_output) in &spec.conditional_deps {
                self.run_node(gate_node, true, depth + 1).await?;
                let open = self
                    .store
                    .get(gate_node, gate_output)
                    .and_then(|value| value.as_bool())
                    .unwrap_or(false);
                if !open {
                    tracing::debug!(node = %name, gate = %gate_node, "gate closed, skipping");
                    self.events.emit(PipelineEvent::NodeSkipped {
                        thread_id: self.thread_id,
                        node: name.clone(),
                        gate_node: gate_node.clone(),
                        gate_output: gate_output.clone(),
                        timestamp: Utc::now(),
                    });
                    return Ok(());
                }
            }

            if self.states.get(&name) == Some(&NodeState::Complete) {
                return Ok(());
            }

            self.running.insert(name.clone());
            let result = self.execute_body(&spec, depth).await;
            match result {
                Ok(outputs) => {
                    self.commit_outputs(&spec, &outputs);
                    self.running.remove(&name);
                    if self.dirty_while_running.remove(&name) {
                        self.states.remove(&name);
                    } else {
                        self.states.insert(name.clone(), NodeState::Complete);
                    }
                    self.events.emit(PipelineEvent::NodeCompleted {
                        thread_id: self.thread_id,
                        node: name.clone(),
                        outputs: self.store.node_outputs(&name).unwrap_or_default(),
                        timestamp: Utc::now(),
                    });
                }
                Err(error) => {
                    self.running.remove(&name);
                    self.dirty_while_running.remove(&name);
                    self.states.insert(name.clone(), NodeState::Error);
                    self.events.emit(PipelineEvent::NodeFailed {
                        thread_id: self.thread_id,
                        node: name.clone(),
                        error: error.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Err(error);
                }
            }

            if !dependency_only {
                for child in &spec.children {
                    if self.signal.is_cancelled() {
                        return Err(EvalError::Cancelled);
                    }
                    self.events.emit(PipelineEvent::ChildStarted {
                        thread_id: self.thread_id,
                        parent: name.clone(),
                        child: child.clone(),
                        timestamp: Utc::now(),
                    });
                    self.run_node(child, false, depth + 1).await?;
                    self.events.emit(PipelineEvent::ChildFinished {
                        thread_id: self.thread_id,
                        parent: name.clone(),
                        child: child.clone(),
                        timestamp: Utc::now(),
                    });
                }
            }

            Ok(())
        }
        .boxed()
    }

    /// Freshens stale input sources, resolves inputs and invokes the
    /// operation body.
    async fn execute_body(
        &mut self,
        spec: &ProcedureSpec,
        depth: usize,
    ) -> Result<OperationOutputs, EvalError> {
        // Pull a source only if it has never produced outputs or was
        // marked stale by a redirect since the last pull
        for source in &spec.input_sources {
            if !self.store.has_node(source) || self.input_dirty.contains(source) {
                self.input_dirty.remove(source);
                self.run_node(source, true, depth + 1).await?;
            }
        }

        let mut inputs = OperationInputs::new();
        for (input_name, binding) in &spec.inputs {
            let overridden = self
                .overrides
                .get(&spec.name)
                .and_then(|values| values.get(input_name))
                .cloned();
            let value = match overridden {
                Some(value) => value,
                None => match binding {
                    InputBinding::Constant { value } => value.clone(),
                    InputBinding::OutputOf {
                        node_name,
                        output_name,
                    } => self.store.get(node_name, output_name).ok_or_else(|| {
                        EvalError::MissingOutput {
                            node: spec.name.clone(),
                            source_node: node_name.clone(),
                            output: output_name.clone(),
                        }
                    })?,
                },
            };
            inputs.insert(input_name.clone(), value);
        }

        let operation =
            self.library
                .get(spec.operation.as_str())
                .ok_or_else(|| EvalError::OperationNotFound {
                    node: spec.name.clone(),
                    operation: spec.operation.to_string(),
                })?;

        self.events.emit(PipelineEvent::NodeStarted {
            thread_id: self.thread_id,
            node: spec.name.clone(),
            operation: spec.operation.to_string(),
            timestamp: Utc::now(),
        });

        let ctx = OperationContext {
            node_name: spec.name.clone(),
            gc: self.gc.clone(),
            cancellation: self.signal.clone(),
            outputs: self.store.clone(),
            events: self.events.create_emitter(self.thread_id, &spec.name),
        };

        operation.invoke(inputs, ctx).await.map_err(|source| match source {
            OperationError::Cancelled => EvalError::Cancelled,
            source => EvalError::NodeFailed {
                node: spec.name.clone(),
                source,
            },
        })
    }

    /// Writes the body's outputs into the store and applies redirects.
    ///
    /// Every produced slot is written under its raw key so in-graph
    /// references resolve against either the slot or the published
    /// name. A redirect whose value actually changed overrides the
    /// target input, marks the target stale for its readers and
    /// invalidates everything downstream of it.
    fn commit_outputs(&mut self, spec: &ProcedureSpec, outputs: &OperationOutputs) {
        for (slot, value) in outputs {
            self.store.set(&spec.name, slot, value.clone());
        }

        for (slot, binding) in &spec.outputs {
            let Some(value) = outputs.get(slot) else {
                continue;
            };
            match binding {
                OutputBinding::Named(public) => {
                    if public != slot {
                        self.store.set(&spec.name, public, value.clone());
                    }
                }
                OutputBinding::Redirect {
                    node_name: target,
                    input_name: target_input,
                } => {
                    if self.redirect_changed(target, target_input, value) {
                        tracing::debug!(
                            node = %spec.name,
                            %slot,
                            %target,
                            input = %target_input,
                            "redirect updated input"
                        );
                        self.overrides
                            .entry(target.clone())
                            .or_default()
                            .insert(target_input.clone(), value.clone());
                        self.input_dirty.insert(target.clone());
                        self.invalidate(target);
                    }
                }
            }
        }
    }

    /// Whether a redirected value differs from the target input's
    /// current effective value: the standing override if any, otherwise
    /// the declared constant. An unchanged write is a fixpoint and must
    /// not re-trigger the loop.
    fn redirect_changed(&self, target: &str, input: &str, value: &Value) -> bool {
        if let Some(current) = self.overrides.get(target).and_then(|values| values.get(input)) {
            return current != value;
        }
        if let Some(target_spec) = self.plan.procedure(target) {
            if let Some((_, InputBinding::Constant { value: declared })) = target_spec
                .inputs
                .iter()
                .find(|(name, _)| name == input)
            {
                return declared != value;
            }
        }
        true
    }

    /// Clears memoization for a node and everything that transitively
    /// consumes it. A node currently on the stack cannot be cleared in
    /// place and is flagged to stay re-runnable instead.
    fn invalidate(&mut self, target: &str) {
        let mut queue = VecDeque::from([target.to_string()]);
        let mut seen: HashSet<String> = queue.iter().cloned().collect();

        while let Some(node) = queue.pop_front() {
            if self.running.contains(&node) {
                self.dirty_while_running.insert(node.clone());
            }
            self.states.remove(&node);
            for dependent in self.plan.dependents_of(&node) {
                if seen.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
    }
}
