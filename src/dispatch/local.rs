// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::dispatch::{DispatchMode, NodeDispatcher};
use crate::engine::InvocationId;
use crate::errors::ExecutionError;
use crate::traits::StepUnit;

/// Invokes units directly on the executor's tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDispatcher;

#[async_trait]
impl NodeDispatcher for LocalDispatcher {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Local
    }

    async fn dispatch(
        &self,
        _invocation_id: InvocationId,
        unit: &Arc<dyn StepUnit>,
        input: Value,
    ) -> Result<Vec<Value>, ExecutionError> {
        unit.invoke(input)
            .await
            .map_err(|source| ExecutionError::UnitExecution {
                node: unit.name().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::UnitError;
    use crate::units::FunctionUnit;
    use serde_json::json;

    #[tokio::test]
    async fn local_dispatch_wraps_unit_errors() {
        let ok: Arc<dyn StepUnit> = Arc::new(FunctionUnit::step("inc", |x: i64| async move { Ok(x + 1) }));
        let bad: Arc<dyn StepUnit> = Arc::new(FunctionUnit::step("bad", |_: i64| async move {
            Err::<i64, _>(UnitError::failed("boom"))
        }));

        let out = LocalDispatcher.dispatch(InvocationId::new(), &ok, json!(1)).await.unwrap();
        assert_eq!(out, vec![json!(2)]);

        let err = LocalDispatcher.dispatch(InvocationId::new(), &bad, json!(1)).await.unwrap_err();
        assert_eq!(
            err,
            ExecutionError::UnitExecution {
                node: "bad".into(),
                source: UnitError::failed("boom"),
            }
        );
    }
}
