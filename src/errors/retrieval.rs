// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::engine::InvocationId;

/// Errors reported to callers querying a runtime after the fact.
///
/// These never affect the engine or any session; they only describe a bad
/// lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("Unknown invocation '{0}'")]
    UnknownInvocation(InvocationId),

    #[error("Unknown node '{node}' in graph '{graph}'")]
    UnknownNode { graph: String, node: String },

    /// A stored value could not be decoded into the requested type.
    #[error("Output {index} of node '{node}' could not be decoded: {detail}")]
    Decode {
        node: String,
        index: usize,
        detail: String,
    },
}
