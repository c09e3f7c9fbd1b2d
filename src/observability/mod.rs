// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and
//! operational logging in the engine. Message types follow a struct-based
//! pattern with `Display` for the text line and
//! [`StructuredLog`](messages::StructuredLog) for the structured event, so
//! the same message is never phrased twice.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - invocation lifecycle, node execution and routing
//! * `messages::dispatch` - remote dispatch and worker pool events
//! * `messages::validation` - graph and configuration validation
//!
//! Binaries call [`init_tracing`] once; the library itself never installs a
//! subscriber.

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "the_stepwood=info,warn";

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(false)
        .try_init();
}
