// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Whole-graph validation.
//!
//! Checks run in a fixed order so the report reads top-down:
//!
//! 1. **Start node**: must be a plain step.
//! 2. **Routers**: every router declares candidates, and each candidate is
//!    fed by that router alone.
//! 3. **Connectivity**: every non-start node has an incoming connection and
//!    is reachable from the start node.
//! 4. **Cycles**: DFS with a recursion stack, reporting the cycle path.
//! 5. **Types**: every static edge, and every router-to-candidate hand-off,
//!    is type compatible.
//!
//! All checks run and their errors accumulate, except that cycle detection
//! is skipped once connectivity errors are present, since the reported path
//! would then be misleading.
//!
//! Construction already refuses cycles edge by edge; the cycle pass here
//! keeps `validate` authoritative on its own.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::errors::StructuralError;
use crate::graph::Graph;
use crate::traits::UnitKind;

pub fn validate_graph(graph: &Graph) -> Result<(), Vec<StructuralError>> {
    let mut errors = Vec::new();

    errors.extend(validate_start(graph));
    errors.extend(validate_routers(graph));

    let connectivity = validate_connectivity(graph);
    let connected = connectivity.is_empty();
    errors.extend(connectivity);

    if connected {
        if let Some(cycle) = find_cycle(graph) {
            errors.push(StructuralError::CyclicDependency { cycle });
        }
    }

    errors.extend(validate_types(graph));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_start(graph: &Graph) -> Vec<StructuralError> {
    match graph.node(graph.start()) {
        Some(unit) if unit.kind() == UnitKind::Router => vec![StructuralError::StartIsRouter {
            node: graph.start().to_string(),
        }],
        _ => Vec::new(),
    }
}

fn validate_routers(graph: &Graph) -> Vec<StructuralError> {
    let mut errors = Vec::new();

    // Every source feeding each node: static predecessors plus routers.
    let mut feeders: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in graph.edges() {
        feeders.entry(to.as_str()).or_default().push(from.as_str());
    }
    for (router, candidates) in graph.routers() {
        for candidate in candidates {
            feeders.entry(candidate.as_str()).or_default().push(router);
        }
    }

    for (router, candidates) in graph.routers() {
        if candidates.is_empty() {
            errors.push(StructuralError::EmptyCandidateSet {
                router: router.to_string(),
            });
        }
        for candidate in candidates {
            let other = feeders
                .get(candidate.as_str())
                .and_then(|sources| sources.iter().find(|&&s| s != router));
            if let Some(other) = other {
                errors.push(StructuralError::CandidateNotExclusive {
                    router: router.to_string(),
                    candidate: candidate.clone(),
                    other: other.to_string(),
                });
            }
        }
    }

    errors
}

fn validate_connectivity(graph: &Graph) -> Vec<StructuralError> {
    let mut errors = Vec::new();

    let fed: HashSet<&str> = graph
        .edges()
        .iter()
        .map(|(_, to)| to.as_str())
        .chain(graph.routers().flat_map(|(_, c)| c.iter().map(String::as_str)))
        .collect();

    let mut reached = HashSet::new();
    let mut queue = VecDeque::from([graph.start()]);
    while let Some(node) = queue.pop_front() {
        if reached.insert(node) {
            queue.extend(graph.downstream(node));
        }
    }

    for name in graph.node_names() {
        if name == graph.start() {
            continue;
        }
        if !fed.contains(name) {
            errors.push(StructuralError::Orphaned {
                node: name.to_string(),
            });
        } else if !reached.contains(name) {
            errors.push(StructuralError::Unreachable {
                node: name.to_string(),
                start: graph.start().to_string(),
            });
        }
    }

    errors
}

/// Three-color DFS over static edges and candidate connections.
///
/// Returns the first cycle found as a closed path (`a -> b -> a`).
pub fn find_cycle(graph: &Graph) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for name in graph.node_names() {
        if !visited.contains(name) {
            if let Some(cycle) = dfs_cycle_detection(name, graph, &mut visited, &mut rec_stack, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn dfs_cycle_detection<'a>(
    node: &'a str,
    graph: &'a Graph,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    for neighbor in graph.downstream(node) {
        if !visited.contains(neighbor) {
            if let Some(cycle) = dfs_cycle_detection(neighbor, graph, visited, rec_stack, path) {
                return Some(cycle);
            }
        } else if rec_stack.contains(neighbor) {
            let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(neighbor.to_string());
            return Some(cycle);
        }
    }

    rec_stack.remove(node);
    path.pop();
    None
}

fn validate_types(graph: &Graph) -> Vec<StructuralError> {
    let mut errors = Vec::new();

    for (from, to) in graph.edges() {
        let (Some(producer), Some(consumer)) = (graph.node(from), graph.node(to)) else {
            continue;
        };
        if !producer.signature().feeds(consumer.signature()) {
            errors.push(StructuralError::IncompatibleEdge {
                from: from.clone(),
                to: to.clone(),
                produced: producer.signature().output.to_string(),
                expected: consumer.signature().input.to_string(),
            });
        }
    }

    // A selected candidate receives the router's own input value.
    for (router, candidates) in graph.routers() {
        let Some(router_unit) = graph.node(router) else {
            continue;
        };
        let forwarded = router_unit.signature().input.element();
        for candidate in candidates {
            let Some(unit) = graph.node(candidate) else {
                continue;
            };
            if !forwarded.compatible_with(unit.signature().input.element()) {
                errors.push(StructuralError::IncompatibleEdge {
                    from: router.to_string(),
                    to: candidate.clone(),
                    produced: forwarded.to_string(),
                    expected: unit.signature().input.to_string(),
                });
            }
        }
    }

    errors
}
