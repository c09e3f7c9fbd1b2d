// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Step units built from plain async functions.
//!
//! The typed function is wrapped in a handler that decodes its argument from
//! a `serde_json::Value` and encodes its result back, so the engine only
//! ever moves values while the caller writes ordinary Rust.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::errors::UnitError;
use crate::traits::StepUnit;
use crate::units::{EnvironmentDescriptor, InputShape, NodeHandle, OutputShape, Signature, TypeRef};

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Vec<Value>, UnitError>> + Send + Sync>;

/// A step unit backed by an async function.
#[derive(Clone)]
pub struct FunctionUnit {
    name: String,
    signature: Signature,
    environment: Option<EnvironmentDescriptor>,
    handler: Handler,
}

impl FunctionUnit {
    /// One input value in, one output value out.
    pub fn step<In, Out, F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Out, UnitError>> + Send + 'static,
    {
        let f = Arc::new(f);
        let handler: Handler = Arc::new(move |value| {
            let f = Arc::clone(&f);
            Box::pin(async move {
                let input: In = decode(value)?;
                let out = f(input).await?;
                Ok(vec![encode(&out)?])
            })
        });
        Self::with_handler(
            name,
            Signature::new(InputShape::One(TypeRef::of::<In>()), OutputShape::One(TypeRef::of::<Out>())),
            handler,
        )
    }

    /// One input value in, zero or more independent output instances out.
    pub fn fan_out<In, Out, F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Out>, UnitError>> + Send + 'static,
    {
        let f = Arc::new(f);
        let handler: Handler = Arc::new(move |value| {
            let f = Arc::clone(&f);
            Box::pin(async move {
                let input: In = decode(value)?;
                let outs = f(input).await?;
                outs.iter().map(encode).collect()
            })
        });
        Self::with_handler(
            name,
            Signature::new(InputShape::One(TypeRef::of::<In>()), OutputShape::List(TypeRef::of::<Out>())),
            handler,
        )
    }

    /// Every bound input value in (as one list), one output value out.
    pub fn reduce<In, Out, F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(Vec<In>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Out, UnitError>> + Send + 'static,
    {
        let f = Arc::new(f);
        let handler: Handler = Arc::new(move |value| {
            let f = Arc::clone(&f);
            Box::pin(async move {
                let inputs: Vec<In> = decode(value)?;
                let out = f(inputs).await?;
                Ok(vec![encode(&out)?])
            })
        });
        Self::with_handler(
            name,
            Signature::new(InputShape::List(TypeRef::of::<In>()), OutputShape::One(TypeRef::of::<Out>())),
            handler,
        )
    }

    fn with_handler(name: impl Into<String>, signature: Signature, handler: Handler) -> Self {
        Self {
            name: name.into(),
            signature,
            environment: None,
            handler,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<EnvironmentDescriptor>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Handle a router can return to select this unit.
    pub fn handle(&self) -> NodeHandle {
        NodeHandle::from(self.name.as_str())
    }
}

impl fmt::Debug for FunctionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionUnit")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("environment", &self.environment.as_ref().map(|e| &e.name))
            .finish()
    }
}

#[async_trait]
impl StepUnit for FunctionUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn environment(&self) -> Option<&EnvironmentDescriptor> {
        self.environment.as_ref()
    }

    async fn invoke(&self, input: Value) -> Result<Vec<Value>, UnitError> {
        (self.handler)(input).await
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, UnitError> {
    serde_json::from_value(value).map_err(|e| UnitError::InvalidInput(e.to_string()))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value, UnitError> {
    serde_json::to_value(value).map_err(|e| UnitError::Encode(e.to_string()))
}
