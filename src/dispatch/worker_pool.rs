// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-process reference worker.
//!
//! [`WorkerPool`] implements [`WorkerClient`] with a shared job queue
//! drained by a fixed number of tokio tasks. Units are looked up by name in
//! a [`UnitRegistry`], the way a real worker would resolve the function
//! named in a request inside its own environment. The environment
//! descriptor is logged and otherwise ignored.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

use crate::errors::DispatchError;
use crate::graph::Graph;
use crate::observability::messages::dispatch::{WorkerJobStarted, WorkerPoolStarted, WorkerUnknownUnit};
use crate::observability::messages::StructuredLog;
use crate::traits::{DispatchOutcome, DispatchRequest, DispatchStatus, StepUnit, Ticket, WorkerClient};

/// Units a worker can run, by name.
#[derive(Clone, Default)]
pub struct UnitRegistry {
    units: HashMap<String, Arc<dyn StepUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry serving every unit of `graph`.
    pub fn from_graph(graph: &Graph) -> Self {
        let mut registry = Self::new();
        for unit in graph.units() {
            registry.register(Arc::clone(unit));
        }
        registry
    }

    pub fn register(&mut self, unit: Arc<dyn StepUnit>) {
        self.units.insert(unit.name().to_string(), unit);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn StepUnit>> {
        self.units.get(name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl std::fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitRegistry")
            .field("unit_count", &self.units.len())
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct Job {
    ticket: Ticket,
    request: DispatchRequest,
    status: watch::Sender<DispatchStatus>,
}

/// Fixed-size pool of tokio tasks serving dispatch requests.
///
/// Must be started from within a tokio runtime. Workers exit once the pool
/// is dropped and the queue drains.
pub struct WorkerPool {
    jobs: mpsc::UnboundedSender<Job>,
    tickets: Mutex<HashMap<Ticket, watch::Receiver<DispatchStatus>>>,
    next_ticket: AtomicU64,
}

impl WorkerPool {
    pub fn start(registry: UnitRegistry, workers: usize) -> Self {
        let workers = workers.max(1);
        let (jobs, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let registry = Arc::new(registry);

        WorkerPoolStarted {
            workers,
            units: registry.len(),
        }
        .log();

        for worker in 0..workers {
            let rx = Arc::clone(&rx);
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => run_job(worker, &registry, job).await,
                        None => break,
                    }
                }
            });
        }

        Self {
            jobs,
            tickets: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Tickets issued and not yet reaped.
    pub async fn outstanding(&self) -> usize {
        self.tickets.lock().await.len()
    }

    async fn receiver(&self, ticket: Ticket) -> Result<watch::Receiver<DispatchStatus>, DispatchError> {
        self.tickets
            .lock()
            .await
            .get(&ticket)
            .cloned()
            .ok_or(DispatchError::UnknownTicket(ticket.0))
    }

    async fn reap(&self, ticket: Ticket) {
        self.tickets.lock().await.remove(&ticket);
    }
}

async fn run_job(worker: usize, registry: &UnitRegistry, job: Job) {
    let Job { ticket, request, status } = job;
    WorkerJobStarted {
        worker,
        ticket: ticket.0,
        node: &request.node,
        environment: request.environment.as_ref().map(|e| e.name.as_str()),
    }
    .log();
    status.send_replace(DispatchStatus::Running);

    let outcome = match registry.get(&request.node) {
        None => {
            WorkerUnknownUnit {
                worker,
                node: &request.node,
            }
            .log();
            DispatchOutcome::Failed(format!("worker has no unit named '{}'", request.node))
        }
        Some(unit) => match request.input() {
            Err(e) => DispatchOutcome::Failed(e.to_string()),
            Ok(input) => match unit.invoke(input).await {
                Ok(values) => DispatchOutcome::Completed(values),
                Err(e) => DispatchOutcome::Failed(e.to_string()),
            },
        },
    };
    status.send_replace(DispatchStatus::Done(outcome));
}

#[async_trait]
impl WorkerClient for WorkerPool {
    async fn submit(&self, request: DispatchRequest) -> Result<Ticket, DispatchError> {
        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        let (status, rx) = watch::channel(DispatchStatus::Queued);
        self.tickets.lock().await.insert(ticket, rx);
        if self.jobs.send(Job { ticket, request, status }).is_err() {
            self.reap(ticket).await;
            return Err(DispatchError::Disconnected);
        }
        Ok(ticket)
    }

    async fn status(&self, ticket: Ticket) -> Result<DispatchStatus, DispatchError> {
        let rx = self.receiver(ticket).await?;
        let status = rx.borrow().clone();
        if status.is_done() {
            self.reap(ticket).await;
        } else if rx.has_changed().is_err() {
            // Sender gone without a final status: the worker task died.
            self.reap(ticket).await;
            return Err(DispatchError::Disconnected);
        }
        Ok(status)
    }

    async fn wait(&self, ticket: Ticket) -> Result<DispatchOutcome, DispatchError> {
        let mut rx = self.receiver(ticket).await?;
        let result = rx
            .wait_for(DispatchStatus::is_done)
            .await
            .map(|status| status.clone());
        self.reap(ticket).await;
        match result {
            Ok(DispatchStatus::Done(outcome)) => Ok(outcome),
            _ => Err(DispatchError::Disconnected),
        }
    }

    async fn release(&self, ticket: Ticket) {
        self.reap(ticket).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InvocationId;
    use crate::errors::UnitError;
    use crate::units::FunctionUnit;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn registry() -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        registry.register(Arc::new(FunctionUnit::step("upper", |s: String| async move {
            Ok(s.to_uppercase())
        })));
        registry.register(Arc::new(FunctionUnit::step("slow", |s: String| async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(s)
        })));
        registry.register(Arc::new(FunctionUnit::step("broken", |_: Value| async move {
            Err::<Value, _>(UnitError::failed("model not loaded"))
        })));
        registry
    }

    fn request(node: &str, input: Value) -> DispatchRequest {
        DispatchRequest::new(InvocationId::new(), node, &input, None).unwrap()
    }

    #[tokio::test]
    async fn wait_returns_outcome_and_reaps_ticket() {
        let pool = WorkerPool::start(registry(), 2);
        let ticket = pool.submit(request("upper", json!("hi"))).await.unwrap();

        let outcome = pool.wait(ticket).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed(vec![json!("HI")]));
        assert_eq!(pool.outstanding().await, 0);
        assert_eq!(pool.status(ticket).await, Err(DispatchError::UnknownTicket(ticket.0)));
    }

    #[tokio::test]
    async fn status_moves_to_done() {
        let pool = WorkerPool::start(registry(), 1);
        let ticket = pool.submit(request("slow", json!("x"))).await.unwrap();

        let first = pool.status(ticket).await.unwrap();
        assert!(matches!(first, DispatchStatus::Queued | DispatchStatus::Running));

        let done = loop {
            match pool.status(ticket).await.unwrap() {
                DispatchStatus::Done(outcome) => break outcome,
                _ => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        };
        assert_eq!(done, DispatchOutcome::Completed(vec![json!("x")]));
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let pool = WorkerPool::start(registry(), 1);

        let ticket = pool.submit(request("broken", json!(null))).await.unwrap();
        assert_eq!(
            pool.wait(ticket).await.unwrap(),
            DispatchOutcome::Failed("model not loaded".into())
        );

        let ticket = pool.submit(request("missing", json!(null))).await.unwrap();
        assert!(matches!(pool.wait(ticket).await.unwrap(), DispatchOutcome::Failed(msg) if msg.contains("missing")));
    }

    #[tokio::test]
    async fn tickets_are_unique() {
        let pool = WorkerPool::start(registry(), 3);
        let a = pool.submit(request("upper", json!("a"))).await.unwrap();
        let b = pool.submit(request("upper", json!("b"))).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.wait(b).await.unwrap(), DispatchOutcome::Completed(vec![json!("B")]));
        assert_eq!(pool.wait(a).await.unwrap(), DispatchOutcome::Completed(vec![json!("A")]));
    }
}
