// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph and configuration validation.
//!
//! This module contains message types for logging events related to:
//! * Graph validation results
//! * Cyclic dependency detection
//! * Configuration value validation

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Graph passed validation.
///
/// # Log Level
/// `info!` - Important operational event
pub struct GraphValidated<'a> {
    pub graph: &'a str,
    pub node_count: usize,
    pub edge_count: usize,
    pub router_count: usize,
}

impl Display for GraphValidated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' validated: {} nodes, {} edges, {} routers",
            self.graph, self.node_count, self.edge_count, self.router_count
        )
    }
}

impl StructuredLog for GraphValidated<'_> {
    fn log(&self) {
        tracing::info!(
            graph = self.graph,
            node_count = self.node_count,
            edge_count = self.edge_count,
            router_count = self.router_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "graph_validated",
            span_name = name,
            graph = self.graph,
            node_count = self.node_count,
        )
    }
}

/// One structural problem found during validation.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_stepwood::errors::StructuralError;
/// use the_stepwood::observability::messages::validation::StructuralProblem;
///
/// let error = StructuralError::Orphaned { node: "summarize".into() };
/// let msg = StructuralProblem {
///     graph: "video-summary",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct StructuralProblem<'a> {
    pub graph: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for StructuralProblem<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Graph '{}' is invalid: {}", self.graph, self.error)
    }
}

impl StructuredLog for StructuralProblem<'_> {
    fn log(&self) {
        tracing::error!(
            graph = self.graph,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "structural_problem",
            span_name = name,
            graph = self.graph,
            error = %self.error,
        )
    }
}

/// Cyclic dependency detected in a graph.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_stepwood::observability::messages::validation::CyclicDependencyDetected;
///
/// let cycle = vec!["transcribe", "classify", "transcribe"];
/// let msg = CyclicDependencyDetected {
///     cycle: &cycle,
/// };
///
/// assert_eq!(msg.to_string(), "Cyclic dependency detected: transcribe -> classify -> transcribe");
/// ```
pub struct CyclicDependencyDetected<'a> {
    pub cycle: &'a [&'a str],
}

impl Display for CyclicDependencyDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cyclic dependency detected: {}", self.cycle.join(" -> "))
    }
}

impl StructuredLog for CyclicDependencyDetected<'_> {
    fn log(&self) {
        tracing::error!(
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "cyclic_dependency",
            span_name = name,
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
        )
    }
}

/// Engine configuration loaded and validated.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ConfigLoaded<'a> {
    pub path: &'a str,
    pub mode: &'a str,
    pub max_concurrency: usize,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded configuration from {}: {} dispatch, max_concurrency={}",
            self.path, self.mode, self.max_concurrency
        )
    }
}

impl StructuredLog for ConfigLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            path = self.path,
            mode = self.mode,
            max_concurrency = self.max_concurrency,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "config_loaded",
            span_name = name,
            path = self.path,
            mode = self.mode,
        )
    }
}
