// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;         // engine configuration + runtime builder
pub mod demo;           // demo graphs
pub mod dispatch;       // local and remote node dispatch
pub mod engine;         // executor, sessions, runtime
pub mod errors;         // error handling
pub mod graph;          // graph construction + validation
pub mod observability;
pub mod traits;         // unified abstractions
pub mod units;          // step and router units
