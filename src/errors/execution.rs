// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Run-time errors: what a unit reports, what the dispatch boundary reports,
//! and what an invocation session is marked failed with.

use std::time::Duration;
use thiserror::Error;

/// Error returned by a unit's own logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    /// The step ran and failed.
    #[error("{0}")]
    Failed(String),

    /// The step could not decode the value it was handed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The step's result could not be serialized.
    #[error("unable to encode output: {0}")]
    Encode(String),
}

impl UnitError {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}

impl From<anyhow::Error> for UnitError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{:#}", err))
    }
}

/// Failure at the remote dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The worker refused the request.
    #[error("worker rejected dispatch: {0}")]
    Rejected(String),

    /// The ticket is not known to the worker (never issued or already reaped).
    #[error("unknown dispatch ticket {0}")]
    UnknownTicket(u64),

    /// The transport to the worker went away.
    #[error("worker connection closed")]
    Disconnected,

    /// The worker did not report completion in time.
    #[error("no completion after {0:?}")]
    Timeout(Duration),

    /// Payload (de)serialization failed on either side of the boundary.
    #[error("payload codec error: {0}")]
    Codec(String),
}

/// Reason an invocation session ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// A value did not satisfy the type a unit declares. Raised before the
    /// consuming node runs, or when a producer emits a non-conforming value.
    #[error("Type mismatch at node '{node}': expected {expected}, {detail}")]
    TypeMismatch {
        node: String,
        expected: String,
        detail: String,
    },

    /// The unit's own logic failed.
    #[error("Node '{node}' failed: {source}")]
    UnitExecution {
        node: String,
        #[source]
        source: UnitError,
    },

    /// A router selected something outside its declared candidate set, or
    /// produced a decision that could not be read.
    #[error("Router '{router}' selected '{selected}' outside its candidates [{}]", .candidates.join(", "))]
    RouterAmbiguity {
        router: String,
        selected: String,
        candidates: Vec<String>,
    },

    /// The dispatch collaborator failed to deliver or report on a node.
    #[error("Dispatch of node '{node}' failed: {source}")]
    Dispatch {
        node: String,
        #[source]
        source: DispatchError,
    },

    /// The caller cancelled the invocation.
    #[error("Invocation cancelled")]
    Cancelled,

    /// A node's outputs were written twice within one invocation.
    #[error("Outputs for node '{node}' were already written in this invocation")]
    DuplicateWrite { node: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ExecutionError {
    /// Whether a retry of the same node could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutionError::UnitExecution { .. } | ExecutionError::Dispatch { .. }
        )
    }
}
