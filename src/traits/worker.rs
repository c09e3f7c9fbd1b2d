// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The boundary to a remote worker.
//!
//! The engine never knows how a request reaches a worker or how the worker
//! provisions the requested environment. It hands over a serialized
//! [`DispatchRequest`], gets a [`Ticket`] back and asks about that ticket
//! until the worker reports a [`DispatchOutcome`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::engine::InvocationId;
use crate::errors::DispatchError;
use crate::units::EnvironmentDescriptor;

/// Worker-issued receipt for a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node call, serialized for a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub invocation_id: InvocationId,
    pub node: String,
    /// JSON-encoded input value.
    pub payload: Vec<u8>,
    pub environment: Option<EnvironmentDescriptor>,
}

impl DispatchRequest {
    pub fn new(
        invocation_id: InvocationId,
        node: impl Into<String>,
        input: &Value,
        environment: Option<EnvironmentDescriptor>,
    ) -> Result<Self, DispatchError> {
        let payload = serde_json::to_vec(input).map_err(|e| DispatchError::Codec(e.to_string()))?;
        Ok(Self {
            invocation_id,
            node: node.into(),
            payload,
            environment,
        })
    }

    /// Decode the payload back into the input value.
    pub fn input(&self) -> Result<Value, DispatchError> {
        serde_json::from_slice(&self.payload).map_err(|e| DispatchError::Codec(e.to_string()))
    }
}

/// Final result reported by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Completed(Vec<Value>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "outcome", rename_all = "snake_case")]
pub enum DispatchStatus {
    Queued,
    Running,
    Done(DispatchOutcome),
}

impl DispatchStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, DispatchStatus::Done(_))
    }
}

#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Hand a request to the worker.
    async fn submit(&self, request: DispatchRequest) -> Result<Ticket, DispatchError>;

    /// Current status of a submitted request. Once a `Done` status has been
    /// returned the worker may forget the ticket.
    async fn status(&self, ticket: Ticket) -> Result<DispatchStatus, DispatchError>;

    /// Wait until the request is done.
    async fn wait(&self, ticket: Ticket) -> Result<DispatchOutcome, DispatchError>;

    /// Give up on a ticket whose outcome will never be asked for.
    async fn release(&self, _ticket: Ticket) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_payload_is_json() {
        let request = DispatchRequest::new(InvocationId::new(), "n", &json!({"k": [1, 2]}), None).unwrap();
        assert_eq!(request.payload, br#"{"k":[1,2]}"#.to_vec());
        assert_eq!(request.input().unwrap(), json!({"k": [1, 2]}));
    }

    #[test]
    fn corrupt_payload_is_a_codec_error() {
        let mut request = DispatchRequest::new(InvocationId::new(), "n", &json!(1), None).unwrap();
        request.payload = b"{not json".to_vec();
        assert!(matches!(request.input(), Err(DispatchError::Codec(_))));
    }
}
