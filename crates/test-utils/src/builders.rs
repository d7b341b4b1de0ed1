#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use nodeforge::dag::{DependencyGraph, Edge, NodeDescriptor, NodeId, PinRef};
use nodeforge::types::{NodeCategory, PinKind};

use crate::fake_nodes::{EventLog, FakeNode, FakeSpec};

/// A graph of [`FakeNode`]s plus handles to inspect it.
#[derive(Debug)]
pub struct TestGraph {
    pub graph: DependencyGraph,
    pub log: EventLog,
    pub ids: BTreeMap<String, NodeId>,
    pub nodes: BTreeMap<String, Arc<FakeNode>>,
}

impl TestGraph {
    pub fn id(&self, name: &str) -> NodeId {
        *self
            .ids
            .get(name)
            .unwrap_or_else(|| panic!("no node named '{name}'"))
    }

    pub fn index(&self, name: &str) -> usize {
        self.graph
            .index_by_name(name)
            .unwrap_or_else(|| panic!("no node named '{name}'"))
    }

    pub fn fake(&self, name: &str) -> &Arc<FakeNode> {
        self.nodes
            .get(name)
            .unwrap_or_else(|| panic!("no node named '{name}'"))
    }
}

/// Builder for graphs of fake nodes, addressed by name.
///
/// `edge(a, b)` connects output 0 of `a` to the lowest free input pin of `b`.
pub struct GraphBuilder {
    graph: DependencyGraph,
    log: EventLog,
    ids: BTreeMap<String, NodeId>,
    nodes: BTreeMap<String, Arc<FakeNode>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: DependencyGraph::new(),
            log: EventLog::new(),
            ids: BTreeMap::new(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn node(self, name: &str) -> Self {
        self.node_with(name, FakeSpec::default())
    }

    pub fn node_with(mut self, name: &str, spec: FakeSpec) -> Self {
        let fake = Arc::new(FakeNode::new(name, spec.clone(), self.log.clone()));
        let index = self.graph.add_node(NodeDescriptor {
            name: name.to_string(),
            category: NodeCategory::Other,
            pins: spec.pins(),
            implementation: fake.clone(),
        });
        self.ids.insert(name.to_string(), self.graph.nodes()[index].id());
        self.nodes.insert(name.to_string(), fake);
        self
    }

    /// Nodes `"0"`, `"1"`, … `"n-1"` in index order.
    pub fn numbered(mut self, n: usize) -> Self {
        for i in 0..n {
            self = self.node(&i.to_string());
        }
        self
    }

    pub fn edge(mut self, from: &str, to: &str) -> Self {
        let from_index = self.index(from);
        let to_index = self.index(to);
        let pin = (0..)
            .find(|&pin| {
                !self
                    .graph
                    .incoming_edges(to_index)
                    .any(|e| e.end == PinRef::input(to_index, pin))
            })
            .expect("free input pin");
        self.graph
            .add_edge(PinRef::output(from_index, 0), PinRef::input(to_index, pin))
            .unwrap_or_else(|e| panic!("edge {from} -> {to}: {e}"));
        self
    }

    pub fn mask_edge(mut self, from: &str, to: &str) -> Self {
        let from_index = self.index(from);
        let to_index = self.index(to);
        self.graph
            .add_edge(PinRef::output(from_index, 0), PinRef::mask(to_index, 0))
            .unwrap_or_else(|e| panic!("mask edge {from} -> {to}: {e}"));
        self
    }

    /// Edges between numbered nodes, e.g. `&[(0, 1), (1, 2)]`.
    pub fn edges(mut self, pairs: &[(usize, usize)]) -> Self {
        for &(from, to) in pairs {
            self = self.edge(&from.to_string(), &to.to_string());
        }
        self
    }

    fn index(&self, name: &str) -> usize {
        self.graph
            .index_by_name(name)
            .unwrap_or_else(|| panic!("no node named '{name}'"))
    }

    pub fn build(self) -> TestGraph {
        TestGraph {
            graph: self.graph,
            log: self.log,
            ids: self.ids,
            nodes: self.nodes,
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw edges for traversal tests, without any nodes behind them.
pub fn raw_edges(pairs: &[(usize, usize)]) -> Vec<Edge> {
    pairs
        .iter()
        .enumerate()
        .map(|(i, &(from, to))| Edge {
            begin: PinRef::output(from, 0),
            end: PinRef::new(to, PinKind::Input, i),
        })
        .collect()
}
