// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Build-time errors raised while assembling or validating a [`Graph`](crate::graph::Graph).
//!
//! Every structural problem is rejected before the first invocation; none of
//! these variants can surface from a running session.

use thiserror::Error;

/// A problem with the shape of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// A unit with the same name is already registered.
    #[error("Duplicate node '{node}': names must be unique within a graph")]
    DuplicateNode { node: String },

    /// An edge or route refers to a unit that was never registered.
    #[error("Node '{node}' is not registered in the graph")]
    UnknownNode { node: String },

    /// The same static edge was declared twice.
    #[error("Edge '{from}' -> '{to}' is already declared")]
    DuplicateEdge { from: String, to: String },

    /// The start node receives the initial input and cannot have predecessors.
    #[error("Start node '{node}' cannot be the target of an edge from '{from}'")]
    EdgeIntoStart { node: String, from: String },

    /// The start node must be a plain step.
    #[error("Start node '{node}' is a router; graphs must start with a step")]
    StartIsRouter { node: String },

    /// Adding the edge (or the graph as declared) contains a cycle.
    #[error("Cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// `route` was called on a unit that is not a router.
    #[error("Node '{node}' is not a router and cannot declare route candidates")]
    NotARouter { node: String },

    /// A router was registered without any candidates.
    #[error("Router '{router}' declares no candidates")]
    EmptyCandidateSet { router: String },

    /// A router candidate is also fed by some other edge or router.
    #[error("Candidate '{candidate}' of router '{router}' is also reachable from '{other}'")]
    CandidateNotExclusive {
        router: String,
        candidate: String,
        other: String,
    },

    /// A non-start node has neither an incoming edge nor a router candidacy.
    #[error("Node '{node}' has no incoming edge or route")]
    Orphaned { node: String },

    /// A node cannot be reached by traversal from the start node.
    #[error("Node '{node}' is unreachable from start node '{start}'")]
    Unreachable { node: String, start: String },

    /// The producer's output type cannot feed the consumer's input type.
    #[error("Type mismatch on '{from}' -> '{to}': '{from}' produces {produced}, '{to}' expects {expected}")]
    IncompatibleEdge {
        from: String,
        to: String,
        produced: String,
        expected: String,
    },
}

/// All structural errors collected by a failed validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Graph '{graph}' failed validation:\n{}", render(.errors))]
pub struct ValidationFailed {
    pub graph: String,
    pub errors: Vec<StructuralError>,
}

fn render(errors: &[StructuralError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
