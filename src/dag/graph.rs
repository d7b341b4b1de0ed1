// src/dag/graph.rs

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dag::edge::{Edge, PinRef};
use crate::dag::node::{Node, NodeDescriptor, NodeId, PinDescriptor};
use crate::dag::traversal::{CycleChecker, Direction, GraphTraversal, Order};
use crate::errors::GraphError;
use crate::types::{Generation, PinKind};

/// The graph shared between the UI thread, the coordinator and workers.
///
/// Every read or write of node flags and progress goes through this lock.
pub type SharedGraph = Arc<Mutex<DependencyGraph>>;

/// Connection state of one input or mask pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConnection {
    pub pin: usize,
    pub mandatory: bool,
    /// The output feeding this pin, if connected.
    pub source: Option<PinRef>,
}

impl PinConnection {
    pub fn is_connected(&self) -> bool {
        self.source.is_some()
    }
}

/// Result of [`DependencyGraph::collect_node_edges`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeEdges {
    pub inputs: Vec<PinConnection>,
    pub masks: Vec<PinConnection>,
}

impl NodeEdges {
    /// Every mandatory input and mask pin has an edge.
    pub fn mandatory_satisfied(&self) -> bool {
        self.inputs
            .iter()
            .chain(self.masks.iter())
            .all(|c| !c.mandatory || c.is_connected())
    }

    pub fn missing_mandatory(&self) -> impl Iterator<Item = &PinConnection> {
        self.inputs
            .iter()
            .chain(self.masks.iter())
            .filter(|c| c.mandatory && !c.is_connected())
    }
}

/// The node/edge tables and every structural mutation on them.
///
/// Edges refer to nodes by index. Removing a node removes its edges and
/// shifts the indices held by every later edge down by one.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the graph for sharing with a coordinator.
    pub fn into_shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id() == id)
    }

    pub fn index_by_name(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    fn check_node(&self, index: usize) -> Result<&Node, GraphError> {
        self.nodes.get(index).ok_or(GraphError::NodeOutOfRange {
            index,
            len: self.nodes.len(),
        })
    }

    fn check_pin(&self, pin: PinRef) -> Result<&PinDescriptor, GraphError> {
        let node = self.check_node(pin.node)?;
        node.pins()
            .pin(pin.kind, pin.index)
            .ok_or_else(|| GraphError::PinOutOfRange {
                node: node.name.clone(),
                kind: pin.kind,
                index: pin.index,
            })
    }

    /// Append a node with a fresh id, on top of every existing node.
    pub fn add_node(&mut self, descriptor: NodeDescriptor) -> usize {
        let z_order = self.top_z_order() + 1;
        let node = Node::from_descriptor(descriptor, z_order);
        debug!(node = %node.name, id = %node.id(), index = self.nodes.len(), "added node");
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Connect two pins.
    ///
    /// The pins may be given in either order; the edge is stored output ->
    /// input. An existing edge into the same input pin is replaced. If the
    /// new edge closes a cycle the graph is restored exactly (including the
    /// replaced edge and its position) and [`GraphError::Cycle`] is returned.
    /// On success everything downstream of the destination is invalidated.
    pub fn add_edge(&mut self, a: PinRef, b: PinRef) -> Result<usize, GraphError> {
        let (begin, end) = match (a.kind, b.kind) {
            (PinKind::Output, k) if k.is_input_like() => (a, b),
            (k, PinKind::Output) if k.is_input_like() => (b, a),
            (from, to) => return Err(GraphError::IncompatiblePins { from, to }),
        };

        let begin_type = self.check_pin(begin)?.data_type;
        let end_type = self.check_pin(end)?.data_type;
        if !begin_type.intersects(end_type) {
            return Err(GraphError::IncompatibleTypes {
                from: begin_type.0,
                to: end_type.0,
            });
        }

        let replaced = self
            .edges
            .iter()
            .position(|e| e.end == end)
            .map(|pos| (pos, self.edges.remove(pos)));

        self.edges.push(Edge { begin, end });

        if self.has_cycles(end.node) {
            self.edges.pop();
            if let Some((pos, old)) = replaced {
                self.edges.insert(pos, old);
            }
            let err = GraphError::Cycle {
                from: self.nodes[begin.node].name.clone(),
                to: self.nodes[end.node].name.clone(),
            };
            warn!(error = %err, "rejected edge");
            return Err(err);
        }

        debug!(
            from = %self.nodes[begin.node].name,
            to = %self.nodes[end.node].name,
            pin = end.index,
            kind = ?end.kind,
            replaced = replaced.is_some(),
            "added edge"
        );
        self.invalidate_downstream(end.node);
        Ok(self.edges.len() - 1)
    }

    pub fn remove_edge(&mut self, index: usize) -> Result<Edge, GraphError> {
        if index >= self.edges.len() {
            return Err(GraphError::EdgeOutOfRange {
                index,
                len: self.edges.len(),
            });
        }
        let edge = self.edges.remove(index);
        self.invalidate_downstream(edge.end.node);
        Ok(edge)
    }

    /// Remove a node and every edge touching it.
    ///
    /// Nodes that lose an input are invalidated, and edge indices above
    /// `index` shift down by one.
    pub fn remove_node(&mut self, index: usize) -> Result<Node, GraphError> {
        self.check_node(index)?;

        let orphaned: Vec<usize> = self
            .edges
            .iter()
            .filter(|e| e.begin.node == index && e.end.node != index)
            .map(|e| e.end.node)
            .collect();
        for node in orphaned {
            self.invalidate_downstream(node);
        }

        self.edges.retain(|e| !e.touches(index));
        for edge in &mut self.edges {
            if edge.begin.node > index {
                edge.begin.node -= 1;
            }
            if edge.end.node > index {
                edge.end.node -= 1;
            }
        }

        let node = self.nodes.remove(index);
        debug!(node = %node.name, id = %node.id(), index, "removed node");
        Ok(node)
    }

    pub fn remove_node_by_id(&mut self, id: NodeId) -> Result<Node, GraphError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        self.remove_node(index)
    }

    /// Iterate from `start` following edges backward (towards dependencies).
    pub fn traverse_upstream(&self, start: usize, unique: bool) -> GraphTraversal {
        GraphTraversal::new(
            self.nodes.len(),
            &self.edges,
            start,
            Direction::Upstream,
            unique,
            Order::PreOrder,
        )
    }

    /// Iterate from `start` following edges forward (towards dependents).
    pub fn traverse_downstream(&self, start: usize, unique: bool) -> GraphTraversal {
        GraphTraversal::new(
            self.nodes.len(),
            &self.edges,
            start,
            Direction::Downstream,
            unique,
            Order::PreOrder,
        )
    }

    /// Upstream post-order walk: dependencies are yielded before dependents.
    pub fn traverse_upstream_post_order(&self, start: usize, unique: bool) -> GraphTraversal {
        GraphTraversal::new(
            self.nodes.len(),
            &self.edges,
            start,
            Direction::Upstream,
            unique,
            Order::PostOrder,
        )
    }

    pub fn visit_upstream<F: FnMut(usize)>(&self, start: usize, unique: bool, visitor: F) {
        self.traverse_upstream(start, unique).for_each(visitor);
    }

    pub fn visit_downstream<F: FnMut(usize)>(&self, start: usize, unique: bool, visitor: F) {
        self.traverse_downstream(start, unique).for_each(visitor);
    }

    /// Whether any node reachable downstream of `start` lies on a cycle
    /// through its own ancestor path.
    pub fn has_cycles(&self, start: usize) -> bool {
        CycleChecker::new(self.nodes.len(), &self.edges, start).has_cycles()
    }

    /// Direct upstream node indices of `node` (one per incoming edge).
    pub fn dependencies_of(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .filter(move |e| e.end.node == node)
            .map(|e| e.begin.node)
    }

    /// Edges terminating at `node`.
    pub fn incoming_edges(&self, node: usize) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.end.node == node)
    }

    pub fn has_outgoing_edges(&self, node: usize) -> bool {
        self.edges.iter().any(|e| e.begin.node == node)
    }

    /// For every declared input and mask pin of `node`: is it connected, and
    /// is it mandatory.
    pub fn collect_node_edges(&self, node: usize) -> Result<NodeEdges, GraphError> {
        let pins = self.check_node(node)?.pins();
        let connections = |kind: PinKind| -> Vec<PinConnection> {
            pins.pins(kind)
                .iter()
                .enumerate()
                .map(|(pin, desc)| PinConnection {
                    pin,
                    mandatory: desc.mandatory,
                    source: self
                        .edges
                        .iter()
                        .find(|e| e.end == PinRef::new(node, kind, pin))
                        .map(|e| e.begin),
                })
                .collect()
        };

        Ok(NodeEdges {
            inputs: connections(PinKind::Input),
            masks: connections(PinKind::MaskInput),
        })
    }

    /// Mark `start` and everything downstream of it as not built, for both
    /// generations, and drop their published outputs.
    ///
    /// A node that is building is flagged stale, so the job in flight cannot
    /// mark it built with outputs computed from the old inputs.
    pub fn invalidate_downstream(&mut self, start: usize) {
        let affected: Vec<usize> = self.traverse_downstream(start, true).collect();
        for index in affected {
            let node = &mut self.nodes[index];
            if node.flags.built || node.flags.preview_built {
                debug!(node = %node.name, "invalidated");
            }
            node.flags.set_built(Generation::Preview, false);
            node.flags.set_built(Generation::Full, false);
            if node.flags.building {
                node.flags.stale = true;
            } else {
                node.set_progress(0.0);
            }
            node.implementation().discard_outputs(Generation::Preview);
            node.implementation().discard_outputs(Generation::Full);
        }
    }

    fn top_z_order(&self) -> i32 {
        self.nodes.iter().map(|n| n.z_order).max().unwrap_or(0)
    }

    /// Raise `index` above every other node.
    pub fn bring_to_front(&mut self, index: usize) -> Result<(), GraphError> {
        self.check_node(index)?;
        let top = self.top_z_order();
        let alone_on_top = self.nodes[index].z_order == top
            && self.nodes.iter().filter(|n| n.z_order == top).count() == 1;
        if !alone_on_top {
            self.nodes[index].z_order = top + 1;
        }
        Ok(())
    }

    /// Node indices ordered bottom-to-top by z-order.
    pub fn draw_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        order.sort_by_key(|&i| self.nodes[i].z_order);
        order
    }

    /// Select a node.
    ///
    /// # Panics
    ///
    /// If the index is out of range or the node is already selected.
    pub fn select(&mut self, index: usize) {
        let node = &mut self.nodes[index];
        assert!(!node.flags.selected, "node '{}' already selected", node.name);
        node.flags.selected = true;
    }

    pub fn deselect(&mut self, index: usize) {
        self.nodes[index].flags.selected = false;
    }

    pub fn clear_selection(&mut self) {
        for node in &mut self.nodes {
            node.flags.selected = false;
        }
    }

    pub fn selected_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.flags.selected)
            .map(|(i, _)| i)
            .collect()
    }
}
