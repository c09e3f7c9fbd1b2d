// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit the same event with its fields attached.
//!
//! # Organization
//!
//! * `engine` - invocation lifecycle, node execution and routing events
//! * `dispatch` - remote dispatch and worker pool events
//! * `validation` - graph and configuration validation events
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_stepwood::observability::messages::{engine::BranchPruned, StructuredLog};
//!
//! let msg = BranchPruned {
//!     invocation_id: "5f0c…",
//!     node: "summarize_sales_call",
//! };
//!
//! msg.log();
//! let _span = msg.span("pruning").entered();
//! ```

pub mod dispatch;
pub mod engine;
pub mod validation;

use tracing::Span;

/// A log message that knows its own level and fields.
pub trait StructuredLog {
    /// Emit the message at its level, with its fields attached.
    fn log(&self);

    /// Create a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
