// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Invocation entry point: validates a graph once, then starts, tracks and
//! answers queries about invocations of it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::dispatch::{LocalDispatcher, NodeDispatcher};
use crate::engine::executor::{ExecutorSettings, GraphExecutor};
use crate::engine::session::{InvocationHandle, InvocationSession, SessionState};
use crate::engine::InvocationId;
use crate::errors::{ExecutionError, RetrievalError, StructuralError, ValidationFailed};
use crate::graph::{ExecutionPlan, Graph};
use crate::observability::messages::validation::{CyclicDependencyDetected, GraphValidated, StructuralProblem};
use crate::observability::messages::StructuredLog;

type Sessions = Arc<RwLock<HashMap<InvocationId, Arc<InvocationHandle>>>>;

/// A validated graph plus the invocations run against it.
///
/// ```rust
/// use the_stepwood::engine::Runtime;
/// use the_stepwood::graph::Graph;
/// use the_stepwood::units::FunctionUnit;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let mut graph = Graph::new("double", FunctionUnit::step("double", |x: i64| async move { Ok(x * 2) }));
/// graph.add_node(FunctionUnit::step("show", |x: i64| async move { Ok(format!("{x}")) }))?;
/// graph.add_edge("double", "show")?;
///
/// let runtime = Runtime::local(graph)?;
/// let id = runtime.run(21, true).await;
/// let shown: Vec<String> = runtime.output_as(id, "show").await?;
/// assert_eq!(shown, vec!["42".to_string()]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Runtime {
    graph: Arc<Graph>,
    executor: Arc<GraphExecutor>,
    sessions: Sessions,
}

impl Runtime {
    /// Validate `graph` and prepare it for execution.
    ///
    /// Every structural problem is reported at once; nothing runs against
    /// an invalid graph.
    pub fn new(
        graph: Graph,
        dispatcher: Arc<dyn NodeDispatcher>,
        settings: ExecutorSettings,
    ) -> Result<Self, ValidationFailed> {
        let plan = validated_plan(&graph)?;
        let graph = Arc::new(graph);
        let executor = GraphExecutor::new(Arc::clone(&graph), Arc::new(plan), dispatcher, settings);
        Ok(Self {
            graph,
            executor: Arc::new(executor),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Runtime invoking every unit in-process with default settings.
    pub fn local(graph: Graph) -> Result<Self, ValidationFailed> {
        Self::new(graph, Arc::new(LocalDispatcher), ExecutorSettings::default())
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn settings(&self) -> ExecutorSettings {
        self.executor.settings()
    }

    /// Start an invocation with `input` bound to the start node.
    ///
    /// With `block_until_done` the call returns once the session is
    /// terminal; otherwise it returns right after the session is created
    /// and the invocation proceeds on a spawned task.
    pub async fn run<I: Serialize>(&self, input: I, block_until_done: bool) -> InvocationId {
        let id = InvocationId::new();
        let mut session = InvocationSession::new(id, self.graph.name());
        let input = match serde_json::to_value(&input) {
            Ok(value) => value,
            Err(e) => {
                session.fail(ExecutionError::TypeMismatch {
                    node: self.graph.start().to_string(),
                    expected: self
                        .graph
                        .node(self.graph.start())
                        .map(|u| u.signature().input.to_string())
                        .unwrap_or_default(),
                    detail: format!("input could not be encoded: {}", e),
                });
                Value::Null
            }
        };

        let handle = Arc::new(InvocationHandle::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&handle));

        let executor = Arc::clone(&self.executor);
        if block_until_done {
            executor.drive(handle, input).await;
        } else {
            tokio::spawn(async move { executor.drive(handle, input).await });
        }
        id
    }

    async fn handle(&self, id: InvocationId) -> Result<Arc<InvocationHandle>, RetrievalError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RetrievalError::UnknownInvocation(id))
    }

    /// Committed outputs of `node`, in production order.
    ///
    /// A node that was pruned, never reached, or has not finished yet
    /// yields an empty list.
    pub async fn output(&self, id: InvocationId, node: &str) -> Result<Vec<Value>, RetrievalError> {
        let handle = self.handle(id).await?;
        if !self.graph.contains(node) {
            return Err(RetrievalError::UnknownNode {
                graph: self.graph.name().to_string(),
                node: node.to_string(),
            });
        }
        let session = handle.session().read().await;
        Ok(session.outputs(node).to_vec())
    }

    /// [`Runtime::output`], decoded into `T`.
    pub async fn output_as<T: DeserializeOwned>(&self, id: InvocationId, node: &str) -> Result<Vec<T>, RetrievalError> {
        self.output(id, node)
            .await?
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                serde_json::from_value(value).map_err(|e| RetrievalError::Decode {
                    node: node.to_string(),
                    index,
                    detail: e.to_string(),
                })
            })
            .collect()
    }

    pub async fn status(&self, id: InvocationId) -> Result<SessionState, RetrievalError> {
        let handle = self.handle(id).await?;
        let state = handle.session().read().await.state().clone();
        Ok(state)
    }

    /// The error a failed invocation stopped with.
    pub async fn error(&self, id: InvocationId) -> Result<Option<ExecutionError>, RetrievalError> {
        let handle = self.handle(id).await?;
        let error = handle.session().read().await.error().cloned();
        Ok(error)
    }

    /// Wait for an invocation to reach a terminal state.
    pub async fn wait(&self, id: InvocationId) -> Result<SessionState, RetrievalError> {
        let handle = self.handle(id).await?;
        handle.finished().await;
        let state = handle.session().read().await.state().clone();
        Ok(state)
    }

    /// Cancel an invocation. Returns `false` if it had already finished;
    /// otherwise it ends `Failed(Cancelled)`.
    pub async fn cancel(&self, id: InvocationId) -> Result<bool, RetrievalError> {
        let handle = self.handle(id).await?;
        let session = handle.session().write().await;
        let running = !session.state().is_terminal();
        if running {
            handle.cancel_token().cancel();
        }
        drop(session);
        Ok(running)
    }

    /// Copy of the session as it stands.
    pub async fn session(&self, id: InvocationId) -> Result<InvocationSession, RetrievalError> {
        let handle = self.handle(id).await?;
        Ok(handle.snapshot().await)
    }

    /// Invocations known to this runtime.
    pub async fn invocations(&self) -> Vec<InvocationId> {
        self.sessions.read().await.keys().copied().collect()
    }
}

/// Validate `graph`, logging the outcome, and derive its execution plan.
fn validated_plan(graph: &Graph) -> Result<ExecutionPlan, ValidationFailed> {
    let failed = |errors: Vec<StructuralError>| ValidationFailed {
        graph: graph.name().to_string(),
        errors,
    };

    if let Err(errors) = graph.validate() {
        for error in &errors {
            if let StructuralError::CyclicDependency { cycle } = error {
                let cycle: Vec<&str> = cycle.iter().map(String::as_str).collect();
                CyclicDependencyDetected { cycle: &cycle }.log();
            }
            StructuralProblem {
                graph: graph.name(),
                error,
            }
            .log();
        }
        return Err(failed(errors));
    }

    let plan = ExecutionPlan::build(graph).ok_or_else(|| {
        failed(vec![StructuralError::CyclicDependency {
            cycle: graph.node_names().map(str::to_string).collect(),
        }])
    })?;

    GraphValidated {
        graph: graph.name(),
        node_count: graph.len(),
        edge_count: graph.edges().len(),
        router_count: graph.routers().count(),
    }
    .log();
    Ok(plan)
}
