// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod executor;
pub mod priority_work_queue;
pub mod runtime;
pub mod session;
#[cfg(test)]
mod integration_tests;

pub use executor::{ExecutorSettings, GraphExecutor};
pub use priority_work_queue::{PrioritizedTask, PriorityWorkQueue};
pub use runtime::Runtime;
pub use session::{InvocationHandle, InvocationId, InvocationSession, NodeRecord, SessionState};
