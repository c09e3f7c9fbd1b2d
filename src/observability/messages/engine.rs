// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for invocation lifecycle and execution events.
//!
//! This module contains message types for logging events related to:
//! * Invocation start, completion, failure and cancellation
//! * Node dispatch, retry, completion and failure
//! * Router decisions and branch pruning

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Invocation started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_stepwood::observability::messages::engine::InvocationStarted;
///
/// let msg = InvocationStarted {
///     invocation_id: "5f0c…",
///     graph: "video-summary",
///     node_count: 7,
///     mode: "local",
///     max_concurrency: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct InvocationStarted<'a> {
    pub invocation_id: &'a str,
    pub graph: &'a str,
    pub node_count: usize,
    pub mode: &'a str,
    pub max_concurrency: usize,
}

impl Display for InvocationStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting invocation {} of graph '{}' ({} nodes, {} dispatch, max_concurrency={})",
            self.invocation_id, self.graph, self.node_count, self.mode, self.max_concurrency
        )
    }
}

impl StructuredLog for InvocationStarted<'_> {
    fn log(&self) {
        tracing::info!(
            invocation_id = self.invocation_id,
            graph = self.graph,
            node_count = self.node_count,
            mode = self.mode,
            max_concurrency = self.max_concurrency,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "invocation",
            span_name = name,
            invocation_id = self.invocation_id,
            graph = self.graph,
            mode = self.mode,
        )
    }
}

/// Invocation reached `Completed`.
///
/// # Log Level
/// `info!` - Important operational event
pub struct InvocationCompleted<'a> {
    pub invocation_id: &'a str,
    pub graph: &'a str,
    pub executed: usize,
    pub pruned: usize,
    pub duration: Duration,
}

impl Display for InvocationCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Invocation {} of graph '{}' completed: {} nodes executed, {} pruned in {:?}",
            self.invocation_id, self.graph, self.executed, self.pruned, self.duration
        )
    }
}

impl StructuredLog for InvocationCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            invocation_id = self.invocation_id,
            graph = self.graph,
            executed = self.executed,
            pruned = self.pruned,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "invocation_completed",
            span_name = name,
            invocation_id = self.invocation_id,
            graph = self.graph,
            duration = ?self.duration,
        )
    }
}

/// Invocation reached `Failed`.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_stepwood::errors::ExecutionError;
/// use the_stepwood::observability::messages::engine::InvocationFailed;
///
/// let error = ExecutionError::Cancelled;
/// let msg = InvocationFailed {
///     invocation_id: "5f0c…",
///     graph: "video-summary",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct InvocationFailed<'a> {
    pub invocation_id: &'a str,
    pub graph: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for InvocationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Invocation {} of graph '{}' failed: {}",
            self.invocation_id, self.graph, self.error
        )
    }
}

impl StructuredLog for InvocationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            invocation_id = self.invocation_id,
            graph = self.graph,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "invocation_failed",
            span_name = name,
            invocation_id = self.invocation_id,
            graph = self.graph,
            error = %self.error,
        )
    }
}

/// Cancellation was requested for a running invocation.
///
/// # Log Level
/// `warn!` - Caller-initiated abort
pub struct InvocationCancelled<'a> {
    pub invocation_id: &'a str,
    pub in_flight: usize,
}

impl Display for InvocationCancelled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Invocation {} cancelled; draining {} in-flight nodes",
            self.invocation_id, self.in_flight
        )
    }
}

impl StructuredLog for InvocationCancelled<'_> {
    fn log(&self) {
        tracing::warn!(
            invocation_id = self.invocation_id,
            in_flight = self.in_flight,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "invocation_cancelled",
            span_name = name,
            invocation_id = self.invocation_id,
        )
    }
}

/// A node left the frontier and is about to run.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeDispatched<'a> {
    pub invocation_id: &'a str,
    pub node: &'a str,
    pub rank: usize,
    pub calls: usize,
}

impl Display for NodeDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatching node '{}' (rank {}) with {} call(s)",
            self.node, self.rank, self.calls
        )
    }
}

impl StructuredLog for NodeDispatched<'_> {
    fn log(&self) {
        tracing::debug!(
            invocation_id = self.invocation_id,
            node = self.node,
            rank = self.rank,
            calls = self.calls,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "node",
            span_name = name,
            invocation_id = self.invocation_id,
            node = self.node,
            rank = self.rank,
        )
    }
}

/// A node committed its outputs.
///
/// # Log Level
/// `info!` - Important operational event
pub struct NodeCompleted<'a> {
    pub invocation_id: &'a str,
    pub node: &'a str,
    pub outputs: usize,
    pub attempts: u32,
    pub duration: Duration,
}

impl Display for NodeCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' produced {} output(s) in {:?}",
            self.node, self.outputs, self.duration
        )
    }
}

impl StructuredLog for NodeCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            invocation_id = self.invocation_id,
            node = self.node,
            outputs = self.outputs,
            attempts = self.attempts,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "node_completed",
            span_name = name,
            invocation_id = self.invocation_id,
            node = self.node,
            outputs = self.outputs,
        )
    }
}

/// A node call failed and will be attempted again.
///
/// # Log Level
/// `warn!` - Recoverable failure
pub struct NodeRetrying<'a> {
    pub invocation_id: &'a str,
    pub node: &'a str,
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: &'a dyn std::error::Error,
}

impl Display for NodeRetrying<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' attempt {}/{} failed, retrying: {}",
            self.node, self.attempt, self.max_attempts, self.error
        )
    }
}

impl StructuredLog for NodeRetrying<'_> {
    fn log(&self) {
        tracing::warn!(
            invocation_id = self.invocation_id,
            node = self.node,
            attempt = self.attempt,
            max_attempts = self.max_attempts,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "node_retrying",
            span_name = name,
            node = self.node,
            attempt = self.attempt,
        )
    }
}

/// A node failed and the invocation will stop dispatching.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct NodeFailed<'a> {
    pub invocation_id: &'a str,
    pub node: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for NodeFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' failed: {}", self.node, self.error)
    }
}

impl StructuredLog for NodeFailed<'_> {
    fn log(&self) {
        tracing::error!(
            invocation_id = self.invocation_id,
            node = self.node,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "node_failed",
            span_name = name,
            invocation_id = self.invocation_id,
            node = self.node,
        )
    }
}

/// A router decided which candidates run for one input.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_stepwood::observability::messages::engine::RouterSelection;
///
/// let selected = ["summarize_job_interview"];
/// let msg = RouterSelection {
///     invocation_id: "5f0c…",
///     router: "route_by_classification",
///     input_index: 0,
///     selected: &selected,
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Router 'route_by_classification' selected [summarize_job_interview] for input 0"
/// );
/// ```
pub struct RouterSelection<'a> {
    pub invocation_id: &'a str,
    pub router: &'a str,
    pub input_index: usize,
    pub selected: &'a [&'a str],
}

impl Display for RouterSelection<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.selected.is_empty() {
            write!(f, "Router '{}' halted input {}", self.router, self.input_index)
        } else {
            write!(
                f,
                "Router '{}' selected [{}] for input {}",
                self.router,
                self.selected.join(", "),
                self.input_index
            )
        }
    }
}

impl StructuredLog for RouterSelection<'_> {
    fn log(&self) {
        tracing::info!(
            invocation_id = self.invocation_id,
            router = self.router,
            input_index = self.input_index,
            selected = self.selected.join(","),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "router_selection",
            span_name = name,
            router = self.router,
            selected = self.selected.join(","),
        )
    }
}

/// A node will not run in this invocation.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct BranchPruned<'a> {
    pub invocation_id: &'a str,
    pub node: &'a str,
}

impl Display for BranchPruned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' pruned: no upstream produced input for it", self.node)
    }
}

impl StructuredLog for BranchPruned<'_> {
    fn log(&self) {
        tracing::debug!(
            invocation_id = self.invocation_id,
            node = self.node,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "branch_pruned",
            span_name = name,
            node = self.node,
        )
    }
}
