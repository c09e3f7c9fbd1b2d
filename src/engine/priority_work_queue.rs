// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Priority-ordered frontier for graph traversal.
//!
//! Ready nodes are popped in a fixed order regardless of when they became
//! ready, which keeps traversal deterministic for a given graph and set of
//! routing decisions.
//!
//! # Priority Ordering
//!
//! 1. **Topological Rank**: lower ranks first (upstream before downstream)
//! 2. **Registration Order**: earlier-registered nodes first at equal rank
//!
//! ```rust
//! use the_stepwood::engine::priority_work_queue::{PriorityWorkQueue, PrioritizedTask};
//!
//! let mut queue = PriorityWorkQueue::new();
//! queue.push(PrioritizedTask::new("summarize".to_string(), 3, 6));
//! queue.push(PrioritizedTask::new("transcribe".to_string(), 2, 2));
//! queue.push(PrioritizedTask::new("classify".to_string(), 2, 3));
//!
//! assert_eq!(queue.pop().map(|t| t.node), Some("transcribe".to_string()));
//! assert_eq!(queue.pop().map(|t| t.node), Some("classify".to_string()));
//! assert_eq!(queue.pop().map(|t| t.node), Some("summarize".to_string()));
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A node that is ready to run.
#[derive(Debug, Clone)]
pub struct PrioritizedTask {
    pub node: String,
    pub rank: usize,
    pub order: usize,
}

impl PrioritizedTask {
    pub fn new(node: String, rank: usize, order: usize) -> Self {
        Self { node, rank, order }
    }
}

impl PrioritizedTask {
    fn key(&self) -> (usize, usize, &str) {
        (self.rank, self.order, &self.node)
    }
}

impl PartialEq for PrioritizedTask {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PrioritizedTask {}

impl PartialOrd for PrioritizedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedTask {
    /// `BinaryHeap` is a max-heap, so the comparison is reversed: the task
    /// that must run first compares greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

#[derive(Debug, Default)]
pub struct PriorityWorkQueue {
    heap: BinaryHeap<PrioritizedTask>,
}

impl PriorityWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: PrioritizedTask) {
        self.heap.push(task);
    }

    /// Remove and return the task that must run next.
    pub fn pop(&mut self) -> Option<PrioritizedTask> {
        self.heap.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_rank_first() {
        let mut queue = PriorityWorkQueue::new();
        queue.push(PrioritizedTask::new("deep".to_string(), 4, 0));
        queue.push(PrioritizedTask::new("root".to_string(), 0, 9));
        queue.push(PrioritizedTask::new("middle".to_string(), 2, 1));

        assert_eq!(queue.pop().unwrap().node, "root");
        assert_eq!(queue.pop().unwrap().node, "middle");
        assert_eq!(queue.pop().unwrap().node, "deep");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let mut queue = PriorityWorkQueue::new();
        queue.push(PrioritizedTask::new("c".to_string(), 1, 3));
        queue.push(PrioritizedTask::new("a".to_string(), 1, 1));
        queue.push(PrioritizedTask::new("b".to_string(), 1, 2));

        assert_eq!(queue.len(), 3);
        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|t| t.node).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_equality_agrees_with_ordering() {
        let a = PrioritizedTask::new("n".to_string(), 1, 2);
        let moved = PrioritizedTask::new("n".to_string(), 3, 2);
        assert_ne!(a, moved);
        assert_ne!(a.cmp(&moved), Ordering::Equal);
        assert_eq!(a, a.clone());
        assert_eq!(a.cmp(&a.clone()), Ordering::Equal);
    }
}
