// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for remote dispatch and the in-process worker pool.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A node call was handed to a worker.
///
/// # Log Level
/// `debug!` - Per-call detail
pub struct DispatchSubmitted<'a> {
    pub invocation_id: &'a str,
    pub node: &'a str,
    pub ticket: u64,
    pub environment: Option<&'a str>,
}

impl Display for DispatchSubmitted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Submitted node '{}' to worker as ticket #{} (environment: {})",
            self.node,
            self.ticket,
            self.environment.unwrap_or("default")
        )
    }
}

impl StructuredLog for DispatchSubmitted<'_> {
    fn log(&self) {
        tracing::debug!(
            invocation_id = self.invocation_id,
            node = self.node,
            ticket = self.ticket,
            environment = self.environment.unwrap_or("default"),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "dispatch",
            span_name = name,
            node = self.node,
            ticket = self.ticket,
        )
    }
}

/// A worker reported a final outcome for a ticket.
///
/// # Log Level
/// `debug!` - Per-call detail
pub struct DispatchFinished<'a> {
    pub node: &'a str,
    pub ticket: u64,
    pub succeeded: bool,
    pub elapsed: Duration,
}

impl Display for DispatchFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let outcome = if self.succeeded { "completed" } else { "failed" };
        write!(
            f,
            "Ticket #{} for node '{}' {} after {:?}",
            self.ticket, self.node, outcome, self.elapsed
        )
    }
}

impl StructuredLog for DispatchFinished<'_> {
    fn log(&self) {
        tracing::debug!(
            node = self.node,
            ticket = self.ticket,
            succeeded = self.succeeded,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "dispatch_finished",
            span_name = name,
            node = self.node,
            ticket = self.ticket,
        )
    }
}

/// No completion arrived within the configured timeout.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct DispatchTimedOut<'a> {
    pub node: &'a str,
    pub ticket: u64,
    pub timeout: Duration,
}

impl Display for DispatchTimedOut<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ticket #{} for node '{}' did not complete within {:?}",
            self.ticket, self.node, self.timeout
        )
    }
}

impl StructuredLog for DispatchTimedOut<'_> {
    fn log(&self) {
        tracing::error!(
            node = self.node,
            ticket = self.ticket,
            timeout_ms = self.timeout.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "dispatch_timed_out",
            span_name = name,
            node = self.node,
            ticket = self.ticket,
        )
    }
}

/// Worker pool started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerPoolStarted {
    pub workers: usize,
    pub units: usize,
}

impl Display for WorkerPoolStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker pool started with {} workers serving {} units",
            self.workers, self.units
        )
    }
}

impl StructuredLog for WorkerPoolStarted {
    fn log(&self) {
        tracing::info!(workers = self.workers, units = self.units, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "worker_pool",
            span_name = name,
            workers = self.workers,
            units = self.units,
        )
    }
}

/// A worker picked up a job.
///
/// # Log Level
/// `debug!` - Per-call detail
pub struct WorkerJobStarted<'a> {
    pub worker: usize,
    pub ticket: u64,
    pub node: &'a str,
    pub environment: Option<&'a str>,
}

impl Display for WorkerJobStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker {} running ticket #{} for node '{}' in environment {}",
            self.worker,
            self.ticket,
            self.node,
            self.environment.unwrap_or("default")
        )
    }
}

impl StructuredLog for WorkerJobStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            worker = self.worker,
            ticket = self.ticket,
            node = self.node,
            environment = self.environment.unwrap_or("default"),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "worker_job",
            span_name = name,
            worker = self.worker,
            ticket = self.ticket,
            node = self.node,
        )
    }
}

/// A worker received a request for a unit it does not serve.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct WorkerUnknownUnit<'a> {
    pub worker: usize,
    pub node: &'a str,
}

impl Display for WorkerUnknownUnit<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker {} has no unit named '{}'", self.worker, self.node)
    }
}

impl StructuredLog for WorkerUnknownUnit<'_> {
    fn log(&self) {
        tracing::error!(worker = self.worker, node = self.node, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "worker_unknown_unit",
            span_name = name,
            worker = self.worker,
            node = self.node,
        )
    }
}
