// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dispatch::{DispatchMode, LocalDispatcher, NodeDispatcher, RemoteDispatcher, UnitRegistry, WorkerPool};
use crate::engine::Runtime;
use crate::errors::ValidationFailed;
use crate::graph::Graph;

/// Runtime builder - turns an engine configuration and a graph into a
/// ready [`Runtime`].
///
/// In remote mode the builder starts the in-process reference
/// [`WorkerPool`] serving every unit of the graph, so it must be called from
/// within a tokio runtime.
///
/// # Examples
///
/// ```
/// use the_stepwood::config::{EngineConfig, RuntimeBuilder};
/// use the_stepwood::graph::Graph;
/// use the_stepwood::units::FunctionUnit;
///
/// let graph = Graph::new("echo", FunctionUnit::step("echo", |s: String| async move { Ok(s) }));
/// let runtime = RuntimeBuilder::from_config(&EngineConfig::default(), graph).unwrap();
/// assert_eq!(runtime.graph().name(), "echo");
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build the dispatcher selected by `cfg`.
    pub fn dispatcher(cfg: &EngineConfig, graph: &Graph) -> Arc<dyn NodeDispatcher> {
        match cfg.mode {
            DispatchMode::Local => Arc::new(LocalDispatcher),
            DispatchMode::Remote => {
                let pool = WorkerPool::start(UnitRegistry::from_graph(graph), cfg.remote.workers);
                let mut dispatcher = RemoteDispatcher::new(Arc::new(pool), cfg.remote.remote_wait());
                if let Some(timeout) = cfg.remote.timeout() {
                    dispatcher = dispatcher.with_timeout(timeout);
                }
                Arc::new(dispatcher)
            }
        }
    }

    /// Validate `graph` and build a runtime configured per `cfg`.
    pub fn from_config(cfg: &EngineConfig, graph: Graph) -> Result<Runtime, ValidationFailed> {
        let dispatcher = Self::dispatcher(cfg, &graph);
        Runtime::new(graph, dispatcher, cfg.executor_settings())
    }
}
