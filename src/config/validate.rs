// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{EdgeKind, GraphFile, RawGraphFile};
use crate::errors::{NodeforgeError, Result};

impl TryFrom<RawGraphFile> for GraphFile {
    type Error = NodeforgeError;

    fn try_from(raw: RawGraphFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_graph(&raw)?;
        Ok(GraphFile::new_unchecked(raw.config, raw.node, raw.edge))
    }
}

/// Run every file-level check on `raw`.
pub fn validate_raw_graph(raw: &RawGraphFile) -> Result<()> {
    ensure_has_nodes(raw)?;
    validate_global_config(raw)?;
    validate_edges(raw)?;
    validate_dag(raw)?;
    Ok(())
}

fn ensure_has_nodes(raw: &RawGraphFile) -> Result<()> {
    if raw.node.is_empty() {
        return Err(NodeforgeError::ConfigError(
            "graph file must contain at least one [node.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(raw: &RawGraphFile) -> Result<()> {
    let cfg = &raw.config;
    if cfg.band_rows == 0 {
        return Err(NodeforgeError::ConfigError(
            "[config].band_rows must be >= 1 (got 0)".to_string(),
        ));
    }
    for (key, value) in [
        ("preview_resolution", cfg.preview_resolution),
        ("full_resolution", cfg.full_resolution),
    ] {
        if value == 0 {
            return Err(NodeforgeError::ConfigError(format!(
                "[config].{key} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn validate_edges(raw: &RawGraphFile) -> Result<()> {
    let mut targets: HashSet<(&str, EdgeKind, usize)> = HashSet::new();

    for edge in raw.edge.iter() {
        for endpoint in [&edge.from, &edge.to] {
            if !raw.node.contains_key(endpoint) {
                return Err(NodeforgeError::ConfigError(format!(
                    "edge {} -> {} references unknown node '{}'",
                    edge.from, edge.to, endpoint
                )));
            }
        }
        if edge.from == edge.to {
            return Err(NodeforgeError::ConfigError(format!(
                "node '{}' cannot be connected to itself",
                edge.from
            )));
        }
        if !targets.insert((edge.to.as_str(), edge.kind, edge.pin)) {
            return Err(NodeforgeError::ConfigError(format!(
                "{:?} pin {} of node '{}' has more than one incoming edge",
                edge.kind, edge.pin, edge.to
            )));
        }
    }
    Ok(())
}

fn validate_dag(raw: &RawGraphFile) -> Result<()> {
    // Edge direction: producer -> consumer.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in raw.node.keys() {
        graph.add_node(name.as_str());
    }
    for edge in raw.edge.iter() {
        graph.add_edge(edge.from.as_str(), edge.to.as_str(), ());
    }

    match toposort(&graph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(NodeforgeError::ConfigError(format!(
            "cycle detected in node graph involving node '{}'",
            cycle.node_id()
        ))),
    }
}
