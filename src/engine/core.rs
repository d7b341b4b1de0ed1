// src/engine/core.rs

//! Pure scheduling decisions.
//!
//! The coordinator thread (`engine::coordinator`) owns the threads, locks
//! and condition variables; the decisions it makes on every `Start` live
//! here, as plain functions over a borrowed graph, so they can be tested
//! without a worker pool.

use std::fmt;

use crate::dag::{DependencyGraph, NodeId, ReadOnlyStateManager};
use crate::types::Generation;

/// States of the coordinator's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Waiting for a job to finish or a cancel request.
    Sleep,
    /// Looking for unbuilt roots to dispatch.
    Start,
    /// Every target-reachable node is built.
    Finished,
    /// Draining the pool after a cancel request or a build error.
    CancelBuild,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoordinatorState::Sleep => "sleep",
            CoordinatorState::Start => "start",
            CoordinatorState::Finished => "finished",
            CoordinatorState::CancelBuild => "cancel",
        };
        f.write_str(s)
    }
}

/// What a `Start` step should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartDecision {
    Finished,
    /// Nothing buildable right now; jobs are still in flight.
    Sleep,
    /// Build these node indices, all in the same wave.
    Dispatch(Vec<usize>),
}

/// Decide the next `Start` step for `targets` (node indices).
pub fn plan_start(state: &ReadOnlyStateManager<'_>, targets: &[usize]) -> StartDecision {
    if state.all_built(targets) {
        return StartDecision::Finished;
    }

    let roots = state.unbuilt_roots(targets);
    if roots.is_empty() {
        StartDecision::Sleep
    } else {
        StartDecision::Dispatch(roots)
    }
}

/// Map target ids to current indices, skipping nodes that no longer exist.
pub fn target_indices(graph: &DependencyGraph, targets: &[NodeId]) -> Vec<usize> {
    targets
        .iter()
        .filter_map(|&id| graph.index_of(id))
        .collect()
}

/// Size of the build: `(unique upstream nodes, of which already built)`.
pub fn build_size(
    graph: &DependencyGraph,
    generation: Generation,
    targets: &[usize],
) -> (usize, usize) {
    let state = ReadOnlyStateManager::new(graph, generation);
    let closure = state.upstream_closure(targets);
    let built = closure.iter().filter(|&&i| state.is_built(i)).count();
    (closure.len(), built)
}
