// src/config/assemble.rs

//! Turn a validated [`GraphFile`] into a live [`DependencyGraph`].

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::model::GraphFile;
use crate::dag::{DependencyGraph, NodeId, PinRef};
use crate::errors::{NodeforgeError, Result};
use crate::registry::NodeRegistry;

/// A graph built from a file, with a lookup from file names to node ids.
#[derive(Debug)]
pub struct AssembledGraph {
    pub graph: DependencyGraph,
    pub ids: BTreeMap<String, NodeId>,
}

impl AssembledGraph {
    pub fn id(&self, name: &str) -> Result<NodeId> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| NodeforgeError::UnknownNode(name.to_string()))
    }
}

/// Create every node through `registry`, then connect the edges.
///
/// Pin kinds, pin indices and data types are checked by
/// [`DependencyGraph::add_edge`]; its error is reported with the edge's
/// endpoint names.
pub fn assemble(file: &GraphFile, registry: &NodeRegistry) -> Result<AssembledGraph> {
    let mut graph = DependencyGraph::new();
    let mut indices: BTreeMap<&str, usize> = BTreeMap::new();
    let mut ids = BTreeMap::new();

    for (name, node) in file.node.iter() {
        let descriptor = registry.create(&node.node_type, name, &node.params)?;
        let index = graph.add_node(descriptor);
        if let (Some(z), Some(n)) = (node.z_order, graph.node_mut(index)) {
            n.z_order = z;
        }
        if let Some(n) = graph.node(index) {
            ids.insert(name.clone(), n.id());
        }
        indices.insert(name.as_str(), index);
        debug!(node = %name, node_type = %node.node_type, index, "node created");
    }

    for edge in file.edge.iter() {
        let (Some(&from), Some(&to)) = (indices.get(edge.from.as_str()), indices.get(edge.to.as_str()))
        else {
            return Err(NodeforgeError::ConfigError(format!(
                "edge {} -> {} references an unknown node",
                edge.from, edge.to
            )));
        };
        graph
            .add_edge(
                PinRef::output(from, edge.from_pin),
                PinRef::new(to, edge.kind.into(), edge.pin),
            )
            .map_err(|err| {
                NodeforgeError::ConfigError(format!(
                    "edge {}[{}] -> {}[{:?} {}]: {err}",
                    edge.from, edge.from_pin, edge.to, edge.kind, edge.pin
                ))
            })?;
    }

    info!(
        nodes = graph.len(),
        edges = graph.edges().len(),
        "graph assembled"
    );

    Ok(AssembledGraph { graph, ids })
}
