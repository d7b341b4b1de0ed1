// src/dag/traversal.rs

//! Stack-based graph traversal with built-in cycle detection.
//!
//! A traversal copies the graph's edges into a working list of
//! `(from, to)` index pairs sorted by `from` (edges are transposed first
//! when walking upstream). Each step looks at the top of an explicit
//! ancestor stack, binary-searches the working list for an edge leaving
//! that node, consumes it, and pushes its other end. When no edge is left
//! the node is popped. Every edge is consumed at most once, so the walk
//! terminates even on a graph that (transiently) contains a cycle.
//!
//! - `unique`: a node already visited is not pushed again.
//! - [`Order::PreOrder`]: a node is yielded when it is first pushed.
//! - [`Order::PostOrder`]: a node is yielded when it is popped, i.e. after
//!   everything reachable from it. Walking upstream in post-order yields
//!   dependencies before dependents.

use crate::dag::edge::Edge;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow edges forward (towards dependents).
    Downstream,
    /// Follow edges backward (towards dependencies).
    Upstream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    PreOrder,
    PostOrder,
}

/// Lazy iterator over node indices.
///
/// Construction snapshots the edge list; the iterator is not resumable
/// against a graph that changed after construction.
#[derive(Debug, Clone)]
pub struct GraphTraversal {
    edges: Vec<(usize, usize)>,
    stack: Vec<usize>,
    visited: Vec<bool>,
    on_stack: Vec<bool>,
    unique: bool,
    order: Order,
    start_pending: bool,
    cycle_detected: bool,
}

impl GraphTraversal {
    pub fn new(
        node_count: usize,
        edges: &[Edge],
        start: usize,
        direction: Direction,
        unique: bool,
        order: Order,
    ) -> Self {
        let mut pairs: Vec<(usize, usize)> = edges
            .iter()
            .map(|e| match direction {
                Direction::Downstream => (e.begin.node, e.end.node),
                Direction::Upstream => (e.end.node, e.begin.node),
            })
            .collect();
        // Stable: edges leaving the same node keep insertion order.
        pairs.sort_by_key(|&(from, _)| from);

        let mut visited = vec![false; node_count];
        let mut on_stack = vec![false; node_count];
        let mut stack = Vec::new();
        if start < node_count {
            visited[start] = true;
            on_stack[start] = true;
            stack.push(start);
        }

        Self {
            edges: pairs,
            stack,
            visited,
            on_stack,
            unique,
            order,
            start_pending: start < node_count,
            cycle_detected: false,
        }
    }

    /// Whether a node re-entered its own ancestor stack so far.
    pub fn cycle_detected(&self) -> bool {
        self.cycle_detected
    }

    /// Current ancestor path, start node first.
    pub fn ancestors(&self) -> &[usize] {
        &self.stack
    }

    fn take_edge_from(&mut self, node: usize) -> Option<usize> {
        let pos = self.edges.partition_point(|&(from, _)| from < node);
        match self.edges.get(pos) {
            Some(&(from, _)) if from == node => Some(self.edges.remove(pos).1),
            _ => None,
        }
    }

    /// One step: consume an edge and maybe push, or pop.
    ///
    /// Returns the node to yield, if this step produced one.
    fn advance(&mut self) -> Option<Step> {
        let &top = self.stack.last()?;

        match self.take_edge_from(top) {
            Some(next) if next >= self.visited.len() => Some(Step::Skipped),
            Some(next) => {
                if self.on_stack[next] {
                    self.cycle_detected = true;
                    return Some(Step::Skipped);
                }
                if self.unique && self.visited[next] {
                    return Some(Step::Skipped);
                }
                self.visited[next] = true;
                self.on_stack[next] = true;
                self.stack.push(next);
                Some(Step::Pushed(next))
            }
            None => {
                self.stack.pop();
                self.on_stack[top] = false;
                Some(Step::Popped(top))
            }
        }
    }
}

enum Step {
    Pushed(usize),
    Popped(usize),
    Skipped,
}

impl Iterator for GraphTraversal {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.order == Order::PreOrder && self.start_pending {
            self.start_pending = false;
            return self.stack.first().copied();
        }

        loop {
            match (self.advance()?, self.order) {
                (Step::Pushed(node), Order::PreOrder) => return Some(node),
                (Step::Popped(node), Order::PostOrder) => return Some(node),
                _ => continue,
            }
        }
    }
}

/// Wraps a traversal and reports whether any node re-entered its own
/// ancestor path.
#[derive(Debug)]
pub struct CycleChecker {
    traversal: GraphTraversal,
}

impl CycleChecker {
    /// Check everything reachable downstream of `start`.
    pub fn new(node_count: usize, edges: &[Edge], start: usize) -> Self {
        Self {
            traversal: GraphTraversal::new(
                node_count,
                edges,
                start,
                Direction::Downstream,
                true,
                Order::PreOrder,
            ),
        }
    }

    /// Run the walk to completion (or to the first cycle).
    pub fn has_cycles(mut self) -> bool {
        while self.traversal.advance().is_some() {
            if self.traversal.cycle_detected() {
                return true;
            }
        }
        false
    }
}
