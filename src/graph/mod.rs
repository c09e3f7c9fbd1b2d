// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph construction.
//!
//! A [`Graph`] is an ordered collection of units plus two kinds of directed
//! connections:
//!
//! - **Static edges** `from -> to`: `to` receives every output `from`
//!   produces and runs once all of its static predecessors have resolved.
//! - **Router candidates**: the successors of a router unit. Which of them
//!   run is decided per input at run time by the router's [`Route`](crate::units::Route).
//!
//! Construction rejects what can be rejected locally (unknown endpoints,
//! duplicates, edges into the start node, cycles). [`Graph::validate`]
//! performs the whole-graph checks and accumulates every problem it finds.
//!
//! ```rust
//! use the_stepwood::graph::Graph;
//! use the_stepwood::units::{FunctionUnit, Route, RouterUnit};
//!
//! let mut graph = Graph::new("parity", FunctionUnit::step("parse", |s: String| async move {
//!     Ok(s.trim().parse::<i64>().unwrap_or_default())
//! }));
//! graph.add_node(RouterUnit::new("branch", |n: i64| {
//!     if n % 2 == 0 { Route::to("even") } else { Route::to("odd") }
//! })).unwrap();
//! graph.add_node(FunctionUnit::step("even", |n: i64| async move { Ok(n / 2) })).unwrap();
//! graph.add_node(FunctionUnit::step("odd", |n: i64| async move { Ok(3 * n + 1) })).unwrap();
//! graph.add_edge("parse", "branch").unwrap();
//! graph.route("branch", ["even", "odd"]).unwrap();
//!
//! assert!(graph.validate().is_ok());
//! assert_eq!(graph.candidates("branch"), ["even", "odd"]);
//! ```

pub mod plan;
pub mod validation;

pub use plan::ExecutionPlan;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::errors::StructuralError;
use crate::traits::{StepUnit, UnitKind};

pub struct Graph {
    name: String,
    start: String,
    nodes: Vec<Arc<dyn StepUnit>>,
    index: HashMap<String, usize>,
    edges: Vec<(String, String)>,
    routes: HashMap<String, Vec<String>>,
}

impl Graph {
    /// Create a graph whose start node is `start`.
    pub fn new<U: StepUnit + 'static>(name: impl Into<String>, start: U) -> Self {
        let start: Arc<dyn StepUnit> = Arc::new(start);
        let start_name = start.name().to_string();
        let mut graph = Self {
            name: name.into(),
            start: start_name.clone(),
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            routes: HashMap::new(),
        };
        graph.index.insert(start_name, 0);
        graph.nodes.push(start);
        graph
    }

    /// Register a unit.
    pub fn add_node<U: StepUnit + 'static>(&mut self, unit: U) -> Result<(), StructuralError> {
        self.add_shared(Arc::new(unit))
    }

    /// Register a unit that is already shared, e.g. one also used by another graph.
    pub fn add_shared(&mut self, unit: Arc<dyn StepUnit>) -> Result<(), StructuralError> {
        let name = unit.name().to_string();
        if self.index.contains_key(&name) {
            return Err(StructuralError::DuplicateNode { node: name });
        }
        if unit.kind() == UnitKind::Router {
            self.routes.entry(name.clone()).or_default();
        }
        self.index.insert(name, self.nodes.len());
        self.nodes.push(unit);
        Ok(())
    }

    /// Connect `from` to `to`.
    ///
    /// When `from` is a router, `to` is added to its candidate set instead
    /// of becoming a static successor.
    pub fn add_edge(&mut self, from: impl AsRef<str>, to: impl AsRef<str>) -> Result<(), StructuralError> {
        let (from, to) = (from.as_ref(), to.as_ref());
        let source = self.require(from)?;
        self.require(to)?;

        if source.kind() == UnitKind::Router {
            return self.add_candidate(from, to);
        }
        if self.edges.iter().any(|(f, t)| f == from && t == to) {
            return Err(StructuralError::DuplicateEdge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.check_new_connection(from, to)?;
        self.edges.push((from.to_string(), to.to_string()));
        Ok(())
    }

    /// Declare (or extend) the candidate set of `router`.
    ///
    /// Candidates keep the order of first declaration; repeating a
    /// candidate is a no-op.
    pub fn route<I, S>(&mut self, router: impl AsRef<str>, candidates: I) -> Result<(), StructuralError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let router = router.as_ref();
        let unit = self.require(router)?;
        if unit.kind() != UnitKind::Router {
            return Err(StructuralError::NotARouter {
                node: router.to_string(),
            });
        }
        let candidates: Vec<S> = candidates.into_iter().collect();
        for candidate in &candidates {
            let candidate = candidate.as_ref();
            self.require(candidate)?;
            if !self.candidates(router).iter().any(|c| c == candidate) {
                self.check_new_connection(router, candidate)?;
            }
        }
        for candidate in &candidates {
            self.add_candidate(router, candidate.as_ref())?;
        }
        Ok(())
    }

    /// Whole-graph structural checks. Every problem found is reported.
    pub fn validate(&self) -> Result<(), Vec<StructuralError>> {
        validation::validate_graph(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn node(&self, name: &str) -> Option<&Arc<dyn StepUnit>> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position of `name` in registration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Units in registration order.
    pub fn units(&self) -> impl Iterator<Item = &Arc<dyn StepUnit>> {
        self.nodes.iter()
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name())
    }

    /// Static edges in declaration order.
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    /// Static successors of `name`, in edge declaration order.
    pub fn successors(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(f, _)| f == name)
            .map(|(_, t)| t.as_str())
            .collect()
    }

    /// Static predecessors of `name`, in edge declaration order.
    pub fn predecessors(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, t)| t == name)
            .map(|(f, _)| f.as_str())
            .collect()
    }

    /// Candidate set of `router`; empty for non-routers.
    pub fn candidates(&self, router: &str) -> &[String] {
        self.routes.get(router).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Routers in registration order, with their candidates.
    pub fn routers(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.nodes
            .iter()
            .filter(|n| n.kind() == UnitKind::Router)
            .map(move |n| (n.name(), self.candidates(n.name())))
    }

    /// Every outgoing connection of `name`: static successors, then candidates.
    pub(crate) fn downstream(&self, name: &str) -> Vec<&str> {
        let mut next = self.successors(name);
        next.extend(self.candidates(name).iter().map(String::as_str));
        next
    }

    fn require(&self, name: &str) -> Result<Arc<dyn StepUnit>, StructuralError> {
        self.node(name).cloned().ok_or_else(|| StructuralError::UnknownNode {
            node: name.to_string(),
        })
    }

    fn add_candidate(&mut self, router: &str, candidate: &str) -> Result<(), StructuralError> {
        if self.candidates(router).iter().any(|c| c == candidate) {
            return Ok(());
        }
        self.check_new_connection(router, candidate)?;
        self.routes
            .entry(router.to_string())
            .or_default()
            .push(candidate.to_string());
        Ok(())
    }

    fn check_new_connection(&self, from: &str, to: &str) -> Result<(), StructuralError> {
        if to == self.start {
            return Err(StructuralError::EdgeIntoStart {
                node: to.to_string(),
                from: from.to_string(),
            });
        }
        if let Some(path) = self.path_between(to, from) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(from.to_string());
            cycle.extend(path);
            return Err(StructuralError::CyclicDependency { cycle });
        }
        Ok(())
    }

    /// Path `from ..= to` over existing connections, if one exists.
    fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        self.dfs_path(from, to, &mut visited, &mut path).then_some(path)
    }

    fn dfs_path<'a>(
        &'a self,
        node: &'a str,
        target: &str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<String>,
    ) -> bool {
        path.push(node.to_string());
        if node == target {
            return true;
        }
        if visited.insert(node) {
            for next in self.downstream(node) {
                if self.dfs_path(next, target, visited, path) {
                    return true;
                }
            }
        }
        path.pop();
        false
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("nodes", &self.node_names().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("routes", &self.routes)
            .finish()
    }
}
