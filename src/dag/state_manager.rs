// src/dag/state_manager.rs

//! Build-flag state transitions on the dependency graph.
//!
//! Everything here runs under the graph lock. The coordinator uses
//! [`StateManager`] to pick unbuilt roots and to record job outcomes;
//! [`ReadOnlyStateManager`] answers the same questions from a shared borrow.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::node::NodeId;
use crate::exec::ResolvedDependencies;
use crate::types::Generation;

/// What [`StateManager::mark_built`] did with a completed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Built,
    /// The node was invalidated while building; it stays unbuilt.
    Stale,
    /// The node was removed from the graph.
    Missing,
}

/// Read-only queries about build state for one generation.
pub struct ReadOnlyStateManager<'a> {
    graph: &'a DependencyGraph,
    generation: Generation,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(graph: &'a DependencyGraph, generation: Generation) -> Self {
        Self { graph, generation }
    }

    /// Every node upstream of (and including) `targets`, each once,
    /// dependencies before dependents.
    pub fn upstream_closure(&self, targets: &[usize]) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for &target in targets {
            for index in self.graph.traverse_upstream_post_order(target, true) {
                if seen.insert(index) {
                    ordered.push(index);
                }
            }
        }
        ordered
    }

    pub fn is_built(&self, index: usize) -> bool {
        self.graph
            .node(index)
            .is_some_and(|n| n.is_built(self.generation))
    }

    /// All direct dependencies of `index` are built for this generation.
    pub fn deps_satisfied(&self, index: usize) -> bool {
        self.graph
            .dependencies_of(index)
            .all(|dep| self.is_built(dep))
    }

    pub fn all_built(&self, targets: &[usize]) -> bool {
        self.upstream_closure(targets)
            .into_iter()
            .all(|index| self.is_built(index))
    }

    /// Nodes reachable upstream of `targets` that are neither built nor in
    /// flight and whose direct dependencies are all built.
    ///
    /// No two returned nodes depend on each other: a dependent of a
    /// returned node has an unbuilt dependency and is excluded.
    pub fn unbuilt_roots(&self, targets: &[usize]) -> Vec<usize> {
        self.upstream_closure(targets)
            .into_iter()
            .filter(|&index| {
                let node = &self.graph.nodes()[index];
                !node.is_built(self.generation)
                    && !node.flags.building
                    && self.deps_satisfied(index)
            })
            .collect()
    }

    /// Upstream outputs feeding `index`, keyed by receiving pin.
    pub fn resolve_dependencies(&self, index: usize) -> ResolvedDependencies {
        let mut resolved = ResolvedDependencies::new();
        for edge in self.graph.incoming_edges(index) {
            let upstream = &self.graph.nodes()[edge.begin.node];
            match upstream
                .implementation()
                .output(self.generation, edge.begin.index)
            {
                Some(image) => resolved.insert(edge.end.kind, edge.end.index, image),
                None => warn!(
                    node = %self.graph.nodes()[index].name,
                    upstream = %upstream.name,
                    "upstream reported built but published no output"
                ),
            }
        }
        resolved
    }
}

/// Mutating build-state transitions for one generation.
pub struct StateManager<'a> {
    graph: &'a mut DependencyGraph,
    generation: Generation,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a mut DependencyGraph, generation: Generation) -> Self {
        Self { graph, generation }
    }

    fn read(&self) -> ReadOnlyStateManager<'_> {
        ReadOnlyStateManager::new(self.graph, self.generation)
    }

    pub fn unbuilt_roots(&self, targets: &[usize]) -> Vec<usize> {
        self.read().unbuilt_roots(targets)
    }

    pub fn all_built(&self, targets: &[usize]) -> bool {
        self.read().all_built(targets)
    }

    pub fn resolve_dependencies(&self, index: usize) -> ResolvedDependencies {
        self.read().resolve_dependencies(index)
    }

    pub fn mark_building(&mut self, index: usize) {
        let node = &mut self.graph.nodes_mut()[index];
        node.flags.building = true;
        node.flags.stale = false;
        node.set_progress(0.0);
        debug!(node = %node.name, generation = %self.generation, "marked building");
    }

    /// Record a completed job.
    ///
    /// A node invalidated while the job ran is left unbuilt, its fresh
    /// outputs are dropped, and the next `Start` dispatches it again.
    pub fn mark_built(&mut self, id: NodeId) -> Completion {
        let generation = self.generation;
        let Some(node) = self.node_by_id(id) else {
            return Completion::Missing;
        };
        node.flags.building = false;
        if node.flags.stale {
            node.flags.stale = false;
            node.set_progress(0.0);
            node.implementation().discard_outputs(generation);
            debug!(node = %node.name, %generation, "completed job was stale; node left unbuilt");
            return Completion::Stale;
        }
        node.flags.set_built(generation, true);
        node.set_progress(1.0);
        debug!(node = %node.name, %generation, "marked built");
        Completion::Built
    }

    /// Record a failed or cancelled job; the node stays unbuilt.
    pub fn mark_failed(&mut self, id: NodeId) -> Option<String> {
        let node = self.node_by_id(id)?;
        node.flags.building = false;
        node.flags.stale = false;
        node.set_progress(0.0);
        debug!(node = %node.name, "build job failed; node left unbuilt");
        Some(node.name.clone())
    }

    /// Advance a building node's progress by `delta`.
    pub fn add_progress(&mut self, id: NodeId, delta: f32) {
        if let Some(node) = self.node_by_id(id) {
            if node.flags.building {
                let progress = node.progress() + delta;
                node.set_progress(progress);
            }
        }
    }

    /// Clear every `building` flag and zero every node's progress.
    ///
    /// Built flags (of either generation) are left untouched.
    pub fn reset_in_flight(&mut self) -> usize {
        let mut reset = 0;
        for node in self.graph.nodes_mut() {
            if node.flags.building {
                reset += 1;
                node.flags.building = false;
            }
            node.flags.stale = false;
            node.set_progress(0.0);
        }
        reset
    }

    fn node_by_id(&mut self, id: NodeId) -> Option<&mut crate::dag::node::Node> {
        let index = self.graph.index_of(id)?;
        self.graph.node_mut(index)
    }
}
