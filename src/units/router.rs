// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Router units and the routing decisions they return.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::errors::UnitError;
use crate::traits::{StepUnit, UnitKind};
use crate::units::function::{decode, encode};
use crate::units::{EnvironmentDescriptor, InputShape, OutputShape, Signature, TypeRef};

/// Reference to a unit by name, as returned inside a [`Route`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeHandle(String);

impl NodeHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeHandle {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for NodeHandle {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A router's decision for one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", content = "targets", rename_all = "snake_case")]
pub enum Route {
    /// Stop this branch; no candidate runs for this input.
    Halt,
    /// Continue with the listed candidates.
    Select(Vec<NodeHandle>),
}

impl Route {
    pub fn to(target: impl Into<NodeHandle>) -> Self {
        Route::Select(vec![target.into()])
    }

    pub fn to_all<I, H>(targets: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<NodeHandle>,
    {
        Route::Select(targets.into_iter().map(Into::into).collect())
    }

    pub fn halt() -> Self {
        Route::Halt
    }

    pub fn targets(&self) -> &[NodeHandle] {
        match self {
            Route::Halt => &[],
            Route::Select(targets) => targets,
        }
    }
}

type Decide = Arc<dyn Fn(Value) -> Result<Route, UnitError> + Send + Sync>;

/// A unit whose output is a [`Route`] over its declared candidates.
#[derive(Clone)]
pub struct RouterUnit {
    name: String,
    signature: Signature,
    environment: Option<EnvironmentDescriptor>,
    decide: Decide,
}

impl RouterUnit {
    pub fn new<In, F>(name: impl Into<String>, f: F) -> Self
    where
        In: DeserializeOwned + 'static,
        F: Fn(In) -> Route + Send + Sync + 'static,
    {
        Self::try_new(name, move |input: In| Ok(f(input)))
    }

    /// Router whose decision can itself fail.
    pub fn try_new<In, F>(name: impl Into<String>, f: F) -> Self
    where
        In: DeserializeOwned + 'static,
        F: Fn(In) -> Result<Route, UnitError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: Signature::new(InputShape::One(TypeRef::of::<In>()), OutputShape::Selection),
            environment: None,
            decide: Arc::new(move |value| f(decode(value)?)),
        }
    }

    pub fn with_environment(mut self, environment: impl Into<EnvironmentDescriptor>) -> Self {
        self.environment = Some(environment.into());
        self
    }
}

impl fmt::Debug for RouterUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterUnit")
            .field("name", &self.name)
            .field("input", &self.signature.input)
            .field("environment", &self.environment.as_ref().map(|e| &e.name))
            .finish()
    }
}

#[async_trait]
impl StepUnit for RouterUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn environment(&self) -> Option<&EnvironmentDescriptor> {
        self.environment.as_ref()
    }

    fn kind(&self) -> UnitKind {
        UnitKind::Router
    }

    async fn invoke(&self, input: Value) -> Result<Vec<Value>, UnitError> {
        let route = (self.decide)(input)?;
        Ok(vec![encode(&route)?])
    }
}
