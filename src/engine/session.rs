// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Invocation sessions: one execution of a graph against one input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::ExecutionError;

/// Identifier of one invocation, unique for the lifetime of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for InvocationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Running,
    Completed,
    Failed(ExecutionError),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Pending => f.write_str("PENDING"),
            SessionState::Running => f.write_str("RUNNING"),
            SessionState::Completed => f.write_str("COMPLETED"),
            SessionState::Failed(_) => f.write_str("FAILED"),
        }
    }
}

/// Diagnostics for one executed node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node: String,
    /// Unit calls made (one per bound value for mapped nodes).
    pub calls: usize,
    pub outputs: usize,
    /// Attempts across all calls, retries included.
    pub attempts: u32,
    pub duration: Duration,
}

/// Everything known about one invocation.
#[derive(Debug, Clone)]
pub struct InvocationSession {
    id: InvocationId,
    graph: String,
    state: SessionState,
    outputs: HashMap<String, Vec<Value>>,
    committed: Vec<String>,
    pruned: Vec<String>,
    records: Vec<NodeRecord>,
}

impl InvocationSession {
    pub fn new(id: InvocationId, graph: impl Into<String>) -> Self {
        Self {
            id,
            graph: graph.into(),
            state: SessionState::Pending,
            outputs: HashMap::new(),
            committed: Vec::new(),
            pruned: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn id(&self) -> InvocationId {
        self.id
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Error the session failed with, if it failed.
    pub fn error(&self) -> Option<&ExecutionError> {
        match &self.state {
            SessionState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn start(&mut self) {
        if self.state == SessionState::Pending {
            self.state = SessionState::Running;
        }
    }

    /// Store a node's outputs. Each node is written at most once.
    pub fn commit(&mut self, node: &str, values: Vec<Value>) -> Result<(), ExecutionError> {
        if self.outputs.contains_key(node) {
            return Err(ExecutionError::DuplicateWrite {
                node: node.to_string(),
            });
        }
        self.outputs.insert(node.to_string(), values);
        self.committed.push(node.to_string());
        Ok(())
    }

    pub fn record(&mut self, record: NodeRecord) {
        self.records.push(record);
    }

    pub fn mark_pruned(&mut self, node: &str) {
        self.pruned.push(node.to_string());
    }

    /// Mark the session completed unless it already failed.
    pub fn complete(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Completed;
        }
    }

    /// Mark the session failed. The first failure wins.
    pub fn fail(&mut self, error: ExecutionError) {
        if !matches!(self.state, SessionState::Failed(_)) {
            self.state = SessionState::Failed(error);
        }
    }

    /// Outputs of `node` in production order; empty if it never produced.
    pub fn outputs(&self, node: &str) -> &[Value] {
        self.outputs.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_output(&self, node: &str) -> bool {
        self.outputs.contains_key(node)
    }

    /// Nodes in the order their outputs were committed.
    pub fn committed(&self) -> &[String] {
        &self.committed
    }

    pub fn pruned(&self) -> &[String] {
        &self.pruned
    }

    pub fn records(&self) -> &[NodeRecord] {
        &self.records
    }
}

/// Shared handle to a live or finished session.
///
/// The executor driving the invocation is the only writer; readers take the
/// read lock and observe only committed outputs.
#[derive(Debug)]
pub struct InvocationHandle {
    session: RwLock<InvocationSession>,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
}

impl InvocationHandle {
    pub fn new(session: InvocationSession) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            session: RwLock::new(session),
            cancel: CancellationToken::new(),
            done,
        }
    }

    pub fn session(&self) -> &RwLock<InvocationSession> {
        &self.session
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Signal waiters that the session reached a terminal state.
    pub fn finish(&self) {
        self.done.send_replace(true);
    }

    /// Resolve once the session has finished.
    pub async fn finished(&self) {
        let mut rx = self.done.subscribe();
        // The sender lives as long as `self`, so `wait_for` only errors if
        // the handle is being dropped.
        let _ = rx.wait_for(|done| *done).await;
    }

    pub async fn snapshot(&self) -> InvocationSession {
        self.session.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invocation_id_parses_its_display_form() {
        let id = InvocationId::new();
        let parsed: InvocationId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_ne!(InvocationId::new(), id);
    }

    #[test]
    fn state_transitions() {
        let mut session = InvocationSession::new(InvocationId::new(), "g");
        assert_eq!(session.state(), &SessionState::Pending);
        session.start();
        assert_eq!(session.state(), &SessionState::Running);
        session.complete();
        assert_eq!(session.state(), &SessionState::Completed);
        assert!(session.state().is_terminal());
    }

    #[test]
    fn first_failure_wins() {
        let mut session = InvocationSession::new(InvocationId::new(), "g");
        session.start();
        session.fail(ExecutionError::Cancelled);
        session.fail(ExecutionError::Internal { message: "later".into() });
        session.complete();
        assert_eq!(session.error(), Some(&ExecutionError::Cancelled));
        assert_eq!(session.state().to_string(), "FAILED");
    }

    #[test]
    fn outputs_are_written_once() {
        let mut session = InvocationSession::new(InvocationId::new(), "g");
        session.commit("a", vec![json!(1), json!(2)]).unwrap();
        assert_eq!(
            session.commit("a", vec![json!(3)]),
            Err(ExecutionError::DuplicateWrite { node: "a".into() })
        );
        assert_eq!(session.outputs("a"), &[json!(1), json!(2)]);
        assert!(session.outputs("b").is_empty());
        assert_eq!(session.committed(), ["a"]);
    }

    #[tokio::test]
    async fn finished_resolves_after_finish() {
        let handle = std::sync::Arc::new(InvocationHandle::new(InvocationSession::new(
            InvocationId::new(),
            "g",
        )));
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.finished().await })
        };
        handle.finish();
        waiter.await.unwrap();
        handle.finished().await;
    }
}
