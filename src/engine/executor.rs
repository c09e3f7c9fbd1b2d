// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Frontier-driven graph executor.
//!
//! The executor walks a validated graph for one invocation:
//!
//! 1. **Frontier**: the start node, bound to the initial input, is the only
//!    ready node. Ready nodes are popped by lowest topological rank, then
//!    registration order ([`PriorityWorkQueue`]).
//! 2. **Dispatch**: a popped node's bound values are type-checked and turned
//!    into calls (one per value for `One` inputs, one with the whole list for
//!    `List` inputs). Up to `max_concurrency` nodes run at once; the calls of
//!    one node run sequentially so outputs keep production order.
//! 3. **Propagation**: a step's outputs are delivered to every static
//!    successor, which becomes ready once all of its upstream sources have
//!    resolved. A router's decisions are checked against its candidate set
//!    before anything is committed; selected candidates receive the router's
//!    own inputs, the rest are pruned.
//! 4. **Pruning**: a node none of whose sources produced anything is pruned,
//!    and resolves its own successors as skipped.
//! 5. **Termination**: the session completes when nothing is ready and
//!    nothing is in flight. A failure or cancellation stops dispatching;
//!    in-flight nodes drain and their outputs are still committed.
//!
//! The driver loop owns all traversal state. Node tasks only report back
//! through the [`JoinSet`], so the session lock is taken for commits alone.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::consts::FALLBACK_CONCURRENCY;
use crate::dispatch::NodeDispatcher;
use crate::engine::priority_work_queue::{PrioritizedTask, PriorityWorkQueue};
use crate::engine::session::{InvocationHandle, NodeRecord};
use crate::engine::InvocationId;
use crate::errors::ExecutionError;
use crate::graph::{ExecutionPlan, Graph};
use crate::observability::messages::engine::{
    BranchPruned, InvocationCancelled, InvocationCompleted, InvocationFailed, InvocationStarted, NodeCompleted,
    NodeDispatched, NodeFailed, NodeRetrying, RouterSelection,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{StepUnit, UnitKind};
use crate::units::{InputShape, OutputShape, Route};

/// Get the default concurrency level based on system capabilities.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_CONCURRENCY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Nodes allowed in flight at once. Clamped to at least 1.
    pub max_concurrency: usize,
    /// Extra attempts for a call failing with a retryable error.
    pub retry_attempts: u32,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_concurrency(),
            retry_attempts: 0,
        }
    }
}

pub struct GraphExecutor {
    graph: Arc<Graph>,
    plan: Arc<ExecutionPlan>,
    dispatcher: Arc<dyn NodeDispatcher>,
    settings: ExecutorSettings,
}

/// What a node task reports back to the driver.
struct NodeRun {
    node: String,
    inputs: Vec<Value>,
    result: Result<Vec<Vec<Value>>, ExecutionError>,
    attempts: u32,
    duration: Duration,
}

impl GraphExecutor {
    pub fn new(
        graph: Arc<Graph>,
        plan: Arc<ExecutionPlan>,
        dispatcher: Arc<dyn NodeDispatcher>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            graph,
            plan,
            dispatcher,
            settings: ExecutorSettings {
                max_concurrency: settings.max_concurrency.max(1),
                ..settings
            },
        }
    }

    pub fn settings(&self) -> ExecutorSettings {
        self.settings
    }

    pub fn dispatcher(&self) -> &Arc<dyn NodeDispatcher> {
        &self.dispatcher
    }

    /// Run one invocation to a terminal state and signal its waiters.
    pub async fn drive(&self, handle: Arc<InvocationHandle>, input: Value) {
        let (invocation_id, already_failed) = {
            let mut session = handle.session().write().await;
            session.start();
            (session.id(), session.error().is_some())
        };
        let id = invocation_id.to_string();
        let started = Instant::now();

        let mode = self.dispatcher.mode().to_string();
        let start_msg = InvocationStarted {
            invocation_id: &id,
            graph: self.graph.name(),
            node_count: self.graph.len(),
            mode: &mode,
            max_concurrency: self.settings.max_concurrency,
        };
        start_msg.log();
        let span = start_msg.span("drive");

        if !already_failed {
            self.traverse(&handle, invocation_id, &id, input)
                .instrument(span)
                .await;
        }

        let mut session = handle.session().write().await;
        // A cancel accepted after traversal ended still decides the outcome.
        if handle.cancel_token().is_cancelled() {
            session.fail(ExecutionError::Cancelled);
        }
        session.complete();
        match session.error() {
            Some(error) => InvocationFailed {
                invocation_id: &id,
                graph: self.graph.name(),
                error,
            }
            .log(),
            None => InvocationCompleted {
                invocation_id: &id,
                graph: self.graph.name(),
                executed: session.committed().len(),
                pruned: session.pruned().len(),
                duration: started.elapsed(),
            }
            .log(),
        }
        drop(session);
        handle.finish();
    }

    async fn traverse(&self, handle: &InvocationHandle, invocation_id: InvocationId, id: &str, input: Value) {
        let cancel = handle.cancel_token().clone();
        let mut traversal = Traversal::new(&self.graph, &self.plan, input);
        let mut in_flight: JoinSet<NodeRun> = JoinSet::new();
        let mut stopping = false;

        loop {
            if !stopping && cancel.is_cancelled() {
                self.cancelled(handle, id, in_flight.len()).await;
                stopping = true;
            }

            while !stopping && in_flight.len() < self.settings.max_concurrency {
                let Some(task) = traversal.queue.pop() else {
                    break;
                };
                match self.launch(&mut in_flight, &mut traversal, invocation_id, id, task) {
                    Ok(()) => {}
                    Err(error) => {
                        self.node_failed(handle, id, error).await;
                        stopping = true;
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled(), if !stopping => {
                    self.cancelled(handle, id, in_flight.len()).await;
                    stopping = true;
                }
                joined = in_flight.join_next() => {
                    let outcome = match joined {
                        Some(Ok(run)) => self.finish_node(handle, &mut traversal, id, run, stopping).await,
                        Some(Err(join_error)) => Err(ExecutionError::Internal {
                            message: format!("node task aborted: {}", join_error),
                        }),
                        None => Ok(()),
                    };
                    if let Err(error) = outcome {
                        self.node_failed(handle, id, error).await;
                        stopping = true;
                    }
                }
            }

            let mut session = handle.session().write().await;
            for node in traversal.take_pruned() {
                BranchPruned { invocation_id: id, node: &node }.log();
                session.mark_pruned(&node);
            }
        }
    }

    /// Type-check a ready node's inputs and spawn its task.
    fn launch(
        &self,
        in_flight: &mut JoinSet<NodeRun>,
        traversal: &mut Traversal<'_>,
        invocation_id: InvocationId,
        id: &str,
        task: PrioritizedTask,
    ) -> Result<(), ExecutionError> {
        let unit = self
            .graph
            .node(&task.node)
            .cloned()
            .ok_or_else(|| ExecutionError::Internal {
                message: format!("node '{}' missing from graph", task.node),
            })?;
        let calls = prepare_calls(unit.as_ref(), traversal.take_inputs(&task.node))?;

        NodeDispatched {
            invocation_id: id,
            node: &task.node,
            rank: task.rank,
            calls: calls.len(),
        }
        .log();

        let dispatcher = Arc::clone(&self.dispatcher);
        let retry_attempts = self.settings.retry_attempts;
        let id = id.to_string();
        in_flight.spawn(async move { run_node(dispatcher, unit, invocation_id, id, calls, retry_attempts).await });
        Ok(())
    }

    /// Commit a finished node and propagate its result.
    async fn finish_node(
        &self,
        handle: &InvocationHandle,
        traversal: &mut Traversal<'_>,
        id: &str,
        run: NodeRun,
        stopping: bool,
    ) -> Result<(), ExecutionError> {
        let record = NodeRecord {
            node: run.node.clone(),
            calls: run.inputs.len(),
            outputs: run.result.as_ref().map(|o| o.iter().map(Vec::len).sum::<usize>()).unwrap_or(0),
            attempts: run.attempts,
            duration: run.duration,
        };
        handle.session().write().await.record(record);

        let per_call = run.result?;
        let unit = self
            .graph
            .node(&run.node)
            .ok_or_else(|| ExecutionError::Internal {
                message: format!("node '{}' missing from graph", run.node),
            })?;

        let routes = match unit.kind() {
            UnitKind::Router => Some(read_routes(&run.node, self.graph.candidates(&run.node), &per_call)?),
            UnitKind::Step => None,
        };

        let outputs: Vec<Value> = per_call.into_iter().flatten().collect();
        let output_count = outputs.len();
        handle.session().write().await.commit(&run.node, outputs.clone())?;
        NodeCompleted {
            invocation_id: id,
            node: &run.node,
            outputs: output_count,
            attempts: run.attempts,
            duration: run.duration,
        }
        .log();

        if stopping {
            return Ok(());
        }

        match routes {
            Some(routes) => {
                for (index, route) in routes.iter().enumerate() {
                    let selected: Vec<&str> = route.targets().iter().map(|t| t.name()).collect();
                    RouterSelection {
                        invocation_id: id,
                        router: &run.node,
                        input_index: index,
                        selected: &selected,
                    }
                    .log();
                }
                traversal.apply_routes(&run.node, &run.inputs, &routes);
            }
            None => traversal.deliver_outputs(&run.node, &outputs),
        }
        Ok(())
    }

    async fn node_failed(&self, handle: &InvocationHandle, id: &str, error: ExecutionError) {
        let node = match &error {
            ExecutionError::TypeMismatch { node, .. }
            | ExecutionError::UnitExecution { node, .. }
            | ExecutionError::Dispatch { node, .. }
            | ExecutionError::DuplicateWrite { node } => node.clone(),
            ExecutionError::RouterAmbiguity { router, .. } => router.clone(),
            _ => String::from("-"),
        };
        NodeFailed {
            invocation_id: id,
            node: &node,
            error: &error,
        }
        .log();
        handle.session().write().await.fail(error);
    }

    async fn cancelled(&self, handle: &InvocationHandle, id: &str, in_flight: usize) {
        InvocationCancelled {
            invocation_id: id,
            in_flight,
        }
        .log();
        handle.session().write().await.fail(ExecutionError::Cancelled);
    }
}

/// Turn a node's bound values into the inputs of its calls.
///
/// Every value is checked against the declared input type first, so a
/// mismatch fails the node before any call is made.
fn prepare_calls(unit: &dyn StepUnit, values: Vec<Value>) -> Result<Vec<Value>, ExecutionError> {
    let input = &unit.signature().input;
    let element = input.element();
    if let Some((index, value)) = values.iter().enumerate().find(|(_, v)| !element.accepts(v)) {
        return Err(ExecutionError::TypeMismatch {
            node: unit.name().to_string(),
            expected: input.to_string(),
            detail: format!("bound value {} was {}", index, preview(value)),
        });
    }
    match input {
        InputShape::One(_) => Ok(values),
        InputShape::List(_) => Ok(vec![Value::Array(values)]),
    }
}

/// Check one call's outputs against the declared output shape.
fn check_outputs(unit: &dyn StepUnit, values: &[Value]) -> Result<(), ExecutionError> {
    let output = &unit.signature().output;
    let mismatch = |detail: String| ExecutionError::TypeMismatch {
        node: unit.name().to_string(),
        expected: output.to_string(),
        detail,
    };
    match output {
        OutputShape::One(_) | OutputShape::Selection if values.len() != 1 => {
            Err(mismatch(format!("call produced {} values", values.len())))
        }
        OutputShape::One(t) | OutputShape::List(t) => {
            match values.iter().find(|v| !t.accepts(v)) {
                Some(bad) => Err(mismatch(format!("produced {}", preview(bad)))),
                None => Ok(()),
            }
        }
        OutputShape::Selection => Ok(()),
    }
}

/// Decode a router's decisions and check them against its candidates.
fn read_routes(router: &str, candidates: &[String], per_call: &[Vec<Value>]) -> Result<Vec<Route>, ExecutionError> {
    let ambiguity = |selected: String| ExecutionError::RouterAmbiguity {
        router: router.to_string(),
        selected,
        candidates: candidates.to_vec(),
    };
    per_call
        .iter()
        .map(|outputs| {
            let value = outputs.first().ok_or_else(|| ambiguity("nothing".to_string()))?;
            let route: Route = serde_json::from_value(value.clone()).map_err(|_| ambiguity(preview(value)))?;
            match route.targets().iter().find(|t| !candidates.iter().any(|c| c == t.name())) {
                Some(outside) => Err(ambiguity(outside.to_string())),
                None => Ok(route),
            }
        })
        .collect()
}

async fn run_node(
    dispatcher: Arc<dyn NodeDispatcher>,
    unit: Arc<dyn StepUnit>,
    invocation_id: InvocationId,
    id: String,
    calls: Vec<Value>,
    retry_attempts: u32,
) -> NodeRun {
    let started = Instant::now();
    let max_attempts = retry_attempts + 1;
    let mut attempts = 0;
    let mut outputs = Vec::with_capacity(calls.len());
    let mut failure = None;

    'calls: for input in &calls {
        let mut attempt = 0;
        loop {
            attempt += 1;
            attempts += 1;
            match dispatcher.dispatch(invocation_id, &unit, input.clone()).await {
                Ok(values) => {
                    if let Err(error) = check_outputs(unit.as_ref(), &values) {
                        failure = Some(error);
                        break 'calls;
                    }
                    outputs.push(values);
                    break;
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    NodeRetrying {
                        invocation_id: &id,
                        node: unit.name(),
                        attempt,
                        max_attempts,
                        error: &error,
                    }
                    .log();
                }
                Err(error) => {
                    failure = Some(error);
                    break 'calls;
                }
            }
        }
    }

    NodeRun {
        node: unit.name().to_string(),
        inputs: calls,
        result: match failure {
            Some(error) => Err(error),
            None => Ok(outputs),
        },
        attempts,
        duration: started.elapsed(),
    }
}

fn preview(value: &Value) -> String {
    const LIMIT: usize = 80;
    let text = value.to_string();
    if text.chars().count() <= LIMIT {
        text
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{}…", cut)
    }
}

/// Traversal state of one invocation.
struct Traversal<'g> {
    graph: &'g Graph,
    plan: &'g ExecutionPlan,
    /// Upstream sources not yet resolved, per node.
    pending: HashMap<String, usize>,
    /// Nodes at least one of whose sources delivered values.
    produced: HashSet<String>,
    /// Delivered values, one slot per static predecessor (slot 0 for the
    /// start node and router candidates).
    bound: HashMap<String, Vec<Vec<Value>>>,
    queue: PriorityWorkQueue,
    pruned: Vec<String>,
}

impl<'g> Traversal<'g> {
    fn new(graph: &'g Graph, plan: &'g ExecutionPlan, input: Value) -> Self {
        let pending = graph
            .node_names()
            .map(|n| (n.to_string(), plan.source_count(n)))
            .collect();
        let mut traversal = Self {
            graph,
            plan,
            pending,
            produced: HashSet::new(),
            bound: HashMap::new(),
            queue: PriorityWorkQueue::new(),
            pruned: Vec::new(),
        };
        let start = graph.start().to_string();
        traversal.bind(&start, 0, vec![input]);
        traversal.enqueue(&start);
        traversal
    }

    fn take_inputs(&mut self, node: &str) -> Vec<Value> {
        self.bound
            .remove(node)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect()
    }

    fn take_pruned(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pruned)
    }

    /// Hand a step's outputs to each static successor.
    fn deliver_outputs(&mut self, node: &str, outputs: &[Value]) {
        let plan = self.plan;
        for successor in plan.successors(node) {
            let slot = plan.slot(successor, node).unwrap_or(0);
            self.bind(successor, slot, outputs.to_vec());
            self.resolve(successor);
        }
    }

    /// Forward each router input to the candidates its route selected.
    fn apply_routes(&mut self, router: &str, inputs: &[Value], routes: &[Route]) {
        let mut selected: HashMap<&str, Vec<Value>> = HashMap::new();
        for (input, route) in inputs.iter().zip(routes) {
            let mut seen = HashSet::new();
            for target in route.targets() {
                if seen.insert(target.name()) {
                    selected.entry(target.name()).or_default().push(input.clone());
                }
            }
        }

        let graph = self.graph;
        for candidate in graph.candidates(router) {
            if let Some(values) = selected.remove(candidate.as_str()) {
                self.bind(candidate, 0, values);
            }
            self.resolve(candidate);
        }
    }

    fn bind(&mut self, node: &str, slot: usize, values: Vec<Value>) {
        let slots = self.bound.entry(node.to_string()).or_default();
        if slots.len() <= slot {
            slots.resize_with(slot + 1, Vec::new);
        }
        slots[slot] = values;
        self.produced.insert(node.to_string());
    }

    /// One upstream source of `node` has resolved.
    fn resolve(&mut self, node: &str) {
        let Some(count) = self.pending.get_mut(node) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count > 0 {
            return;
        }
        if self.produced.contains(node) {
            self.enqueue(node);
        } else {
            self.prune(node);
        }
    }

    fn enqueue(&mut self, node: &str) {
        self.queue.push(PrioritizedTask::new(
            node.to_string(),
            self.plan.rank(node),
            self.plan.order(node),
        ));
    }

    fn prune(&mut self, node: &str) {
        self.pruned.push(node.to_string());
        let graph = self.graph;
        for next in graph.downstream(node) {
            self.resolve(next);
        }
    }
}
