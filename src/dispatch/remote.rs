// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dispatch through a [`WorkerClient`].
//!
//! Each call is serialized into a [`DispatchRequest`] carrying the unit's
//! environment descriptor, submitted, and then either awaited in one
//! blocking call or polled at a fixed interval. An optional timeout bounds
//! both.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::dispatch::{DispatchMode, NodeDispatcher};
use crate::engine::InvocationId;
use crate::errors::{DispatchError, ExecutionError, UnitError};
use crate::observability::messages::dispatch::{DispatchFinished, DispatchSubmitted, DispatchTimedOut};
use crate::observability::messages::StructuredLog;
use crate::traits::{DispatchOutcome, DispatchRequest, DispatchStatus, StepUnit, Ticket, WorkerClient};

/// How completion of a submitted call is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteWait {
    /// A single `wait` call on the worker.
    Block,
    /// `status` calls separated by the given interval.
    Poll(Duration),
}

pub struct RemoteDispatcher {
    client: Arc<dyn WorkerClient>,
    wait: RemoteWait,
    timeout: Option<Duration>,
}

impl RemoteDispatcher {
    pub fn new(client: Arc<dyn WorkerClient>, wait: RemoteWait) -> Self {
        Self {
            client,
            wait,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn await_outcome(&self, ticket: Ticket) -> Result<DispatchOutcome, DispatchError> {
        match self.wait {
            RemoteWait::Block => self.client.wait(ticket).await,
            RemoteWait::Poll(interval) => loop {
                match self.client.status(ticket).await? {
                    DispatchStatus::Done(outcome) => break Ok(outcome),
                    DispatchStatus::Queued | DispatchStatus::Running => tokio::time::sleep(interval).await,
                }
            },
        }
    }

    async fn run(&self, invocation_id: InvocationId, unit: &Arc<dyn StepUnit>, input: Value) -> Result<Vec<Value>, ExecutionError> {
        let node = unit.name();
        let dispatch_err = |source| ExecutionError::Dispatch {
            node: node.to_string(),
            source,
        };

        let request = DispatchRequest::new(invocation_id, node, &input, unit.environment().cloned())
            .map_err(dispatch_err)?;
        let ticket = self.client.submit(request).await.map_err(dispatch_err)?;
        let id = invocation_id.to_string();
        DispatchSubmitted {
            invocation_id: &id,
            node,
            ticket: ticket.0,
            environment: unit.environment().map(|e| e.name.as_str()),
        }
        .log();

        let started = Instant::now();
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.await_outcome(ticket)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    DispatchTimedOut {
                        node,
                        ticket: ticket.0,
                        timeout: limit,
                    }
                    .log();
                    self.client.release(ticket).await;
                    Err(DispatchError::Timeout(limit))
                }
            },
            None => self.await_outcome(ticket).await,
        }
        .map_err(dispatch_err)?;

        DispatchFinished {
            node,
            ticket: ticket.0,
            succeeded: matches!(outcome, DispatchOutcome::Completed(_)),
            elapsed: started.elapsed(),
        }
        .log();

        match outcome {
            DispatchOutcome::Completed(values) => Ok(values),
            DispatchOutcome::Failed(message) => Err(ExecutionError::UnitExecution {
                node: node.to_string(),
                source: UnitError::Failed(message),
            }),
        }
    }
}

#[async_trait]
impl NodeDispatcher for RemoteDispatcher {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Remote
    }

    async fn dispatch(
        &self,
        invocation_id: InvocationId,
        unit: &Arc<dyn StepUnit>,
        input: Value,
    ) -> Result<Vec<Value>, ExecutionError> {
        self.run(invocation_id, unit, input).await
    }
}
