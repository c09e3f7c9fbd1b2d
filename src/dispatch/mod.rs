// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! How a single node call is carried out.
//!
//! The executor decides *what* runs and in which order; a [`NodeDispatcher`]
//! decides *where*. [`LocalDispatcher`] invokes the unit in-process,
//! [`RemoteDispatcher`] ships the call to a [`WorkerClient`](crate::traits::WorkerClient)
//! and [`WorkerPool`] is an in-process worker for tests and demos.

pub mod local;
pub mod remote;
pub mod worker_pool;

pub use local::LocalDispatcher;
pub use remote::{RemoteDispatcher, RemoteWait};
pub use worker_pool::{UnitRegistry, WorkerPool};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::engine::InvocationId;
use crate::errors::ExecutionError;
use crate::traits::StepUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    #[default]
    Local,
    Remote,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Local => f.write_str("local"),
            DispatchMode::Remote => f.write_str("remote"),
        }
    }
}

#[async_trait]
pub trait NodeDispatcher: Send + Sync {
    fn mode(&self) -> DispatchMode;

    /// Run one call of `unit` and return its output instances.
    async fn dispatch(
        &self,
        invocation_id: InvocationId,
        unit: &Arc<dyn StepUnit>,
        input: Value,
    ) -> Result<Vec<Value>, ExecutionError>;
}
