// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Precomputed scheduling data for a validated graph.
//!
//! The executor needs, for every node, its topological rank (the frontier
//! priority), its static neighbours in declaration order and how many
//! upstream sources must resolve before it is ready. All of that is derived
//! once per [`Runtime`](crate::engine::Runtime) and shared by every session.

use std::collections::{HashMap, VecDeque};

use crate::graph::Graph;

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    ranks: HashMap<String, usize>,
    order: HashMap<String, usize>,
    successors: HashMap<String, Vec<String>>,
    predecessors: HashMap<String, Vec<String>>,
    sources: HashMap<String, usize>,
}

impl ExecutionPlan {
    /// Build the plan, or `None` when the graph is cyclic.
    pub fn build(graph: &Graph) -> Option<Self> {
        let ranks = topological_ranks(graph)?;

        let mut order = HashMap::new();
        let mut successors: HashMap<String, Vec<String>> = HashMap::new();
        let mut predecessors: HashMap<String, Vec<String>> = HashMap::new();
        let mut sources = HashMap::new();
        for (i, name) in graph.node_names().enumerate() {
            order.insert(name.to_string(), i);
            successors.insert(name.to_string(), Vec::new());
            predecessors.insert(name.to_string(), Vec::new());
            sources.insert(name.to_string(), 0);
        }
        for (from, to) in graph.edges() {
            successors.entry(from.clone()).or_default().push(to.clone());
            predecessors.entry(to.clone()).or_default().push(from.clone());
            *sources.entry(to.clone()).or_insert(0) += 1;
        }

        for (_, candidates) in graph.routers() {
            for candidate in candidates {
                *sources.entry(candidate.clone()).or_insert(0) += 1;
            }
        }

        Some(Self {
            ranks,
            order,
            successors,
            predecessors,
            sources,
        })
    }

    /// Longest distance from any root; lower ranks run first.
    pub fn rank(&self, node: &str) -> usize {
        self.ranks.get(node).copied().unwrap_or(0)
    }

    /// Registration position, used to break ties between equal ranks.
    pub fn order(&self, node: &str) -> usize {
        self.order.get(node).copied().unwrap_or(usize::MAX)
    }

    pub fn successors(&self, node: &str) -> &[String] {
        self.successors.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors(&self, node: &str) -> &[String] {
        self.predecessors.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of upstream connections (static edges plus router candidacy).
    pub fn source_count(&self, node: &str) -> usize {
        self.sources.get(node).copied().unwrap_or(0)
    }

    /// Position of `predecessor` among `node`'s static predecessors.
    pub fn slot(&self, node: &str, predecessor: &str) -> Option<usize> {
        self.predecessors(node).iter().position(|p| p == predecessor)
    }
}

/// Kahn's algorithm over static edges and candidate connections, assigning
/// each node the length of the longest path reaching it.
fn topological_ranks(graph: &Graph) -> Option<HashMap<String, usize>> {
    let mut in_degree: HashMap<&str, usize> = graph.node_names().map(|n| (n, 0)).collect();
    for name in graph.node_names() {
        for next in graph.downstream(name) {
            *in_degree.entry(next).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<&str> = graph
        .node_names()
        .filter(|n| in_degree.get(n).copied() == Some(0))
        .collect();
    let mut ranks: HashMap<String, usize> = queue.iter().map(|n| (n.to_string(), 0)).collect();
    let mut visited = 0;

    while let Some(node) = queue.pop_front() {
        visited += 1;
        let rank = ranks.get(node).copied().unwrap_or(0);
        for next in graph.downstream(node) {
            let entry = ranks.entry(next.to_string()).or_insert(0);
            *entry = (*entry).max(rank + 1);
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    (visited == graph.len()).then_some(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{FunctionUnit, Route, RouterUnit};

    fn step(name: &str) -> FunctionUnit {
        FunctionUnit::step(name, |x: i64| async move { Ok(x) })
    }

    #[test]
    fn ranks_use_longest_path() {
        // a -> b -> d, a -> d
        let mut graph = Graph::new("g", step("a"));
        for name in ["b", "d"] {
            graph.add_node(step(name)).unwrap();
        }
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("a", "d").unwrap();
        graph.add_edge("b", "d").unwrap();

        let plan = ExecutionPlan::build(&graph).unwrap();
        assert_eq!(plan.rank("a"), 0);
        assert_eq!(plan.rank("b"), 1);
        assert_eq!(plan.rank("d"), 2);
        assert_eq!(plan.predecessors("d"), ["a", "b"]);
        assert_eq!(plan.slot("d", "b"), Some(1));
        assert_eq!(plan.source_count("d"), 2);
    }

    #[test]
    fn candidates_count_as_single_source() {
        let mut graph = Graph::new("g", step("a"));
        graph.add_node(RouterUnit::new("r", |_: i64| Route::halt())).unwrap();
        graph.add_node(step("c")).unwrap();
        graph.add_edge("a", "r").unwrap();
        graph.route("r", ["c"]).unwrap();

        let plan = ExecutionPlan::build(&graph).unwrap();
        assert_eq!(plan.rank("c"), 2);
        assert_eq!(plan.source_count("c"), 1);
        assert!(plan.predecessors("c").is_empty());
    }
}
