// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::UnitError;
use crate::units::{EnvironmentDescriptor, Signature};

/// Whether a unit transforms data or decides where data goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Step,
    Router,
}

/// A named computation the engine can place in a graph.
///
/// A unit receives one call's input (a single value, or an array for
/// list-shaped inputs) and returns the output instances of that call. A
/// `One`-shaped output yields exactly one instance; a fan-out yields zero or
/// more; a router yields exactly one encoded [`Route`](crate::units::Route).
#[async_trait]
pub trait StepUnit: Send + Sync {
    fn name(&self) -> &str;

    fn signature(&self) -> &Signature;

    /// Execution environment forwarded to remote workers.
    fn environment(&self) -> Option<&EnvironmentDescriptor> {
        None
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Step
    }

    async fn invoke(&self, input: Value) -> Result<Vec<Value>, UnitError>;
}
