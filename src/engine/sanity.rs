// src/engine/sanity.rs

//! Checks run once when a build is requested, before any scheduling.
//!
//! 1. Targets whose upstream closure contains a node with an unconnected
//!    mandatory input or mask pin are dropped with a warning.
//! 2. Targets that are already part of another target's upstream closure
//!    are dropped: building the other target builds them anyway.

use std::collections::HashSet;

use tracing::warn;

use crate::dag::{DependencyGraph, NodeId, ReadOnlyStateManager};
use crate::types::Generation;

/// Result of [`sanitize_targets`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunedTargets {
    pub kept: Vec<NodeId>,
    /// `(target, offending node)` names.
    pub unconnected: Vec<(String, String)>,
    pub inner: Vec<String>,
    pub unknown: Vec<NodeId>,
}

pub fn sanitize_targets(graph: &DependencyGraph, targets: &[NodeId]) -> PrunedTargets {
    let mut pruned = PrunedTargets::default();
    let state = ReadOnlyStateManager::new(graph, Generation::Preview);

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for &id in targets {
        if !seen.insert(id) {
            continue;
        }
        match graph.index_of(id) {
            Some(index) => candidates.push((id, index)),
            None => {
                warn!(%id, "build target not in graph; dropping");
                pruned.unknown.push(id);
            }
        }
    }

    // Missing mandatory connections anywhere upstream.
    let mut connected = Vec::new();
    for (id, index) in candidates {
        let closure = state.upstream_closure(&[index]);
        let offender = closure.into_iter().find(|&i| {
            graph
                .collect_node_edges(i)
                .map(|edges| !edges.mandatory_satisfied())
                .unwrap_or(true)
        });
        match offender {
            Some(bad) => {
                let target = graph.nodes()[index].name.clone();
                let node = graph.nodes()[bad].name.clone();
                warn!(
                    target = %target,
                    node = %node,
                    "mandatory input not connected; dropping build target"
                );
                pruned.unconnected.push((target, node));
            }
            None => connected.push((id, index)),
        }
    }

    // Inner targets: upstream of another remaining target.
    for &(id, index) in &connected {
        let is_inner = connected.iter().any(|&(other_id, other)| {
            other_id != id && state.upstream_closure(&[other]).contains(&index)
        });
        if is_inner {
            let name = graph.nodes()[index].name.clone();
            warn!(target = %name, "target already built as part of another target; dropping");
            pruned.inner.push(name);
        } else {
            pruned.kept.push(id);
        }
    }

    pruned
}
