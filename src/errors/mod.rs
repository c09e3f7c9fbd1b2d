// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod retrieval;
mod structural;

pub use config::ConfigError;
pub use execution::{DispatchError, ExecutionError, UnitError};
pub use retrieval::RetrievalError;
pub use structural::{StructuralError, ValidationFailed};
