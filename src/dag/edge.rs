// src/dag/edge.rs

use crate::types::PinKind;

/// One end of an edge: a pin on a node, addressed by node *index*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinRef {
    pub node: usize,
    pub kind: PinKind,
    pub index: usize,
}

impl PinRef {
    pub fn new(node: usize, kind: PinKind, index: usize) -> Self {
        Self { node, kind, index }
    }

    pub fn output(node: usize, index: usize) -> Self {
        Self::new(node, PinKind::Output, index)
    }

    pub fn input(node: usize, index: usize) -> Self {
        Self::new(node, PinKind::Input, index)
    }

    pub fn mask(node: usize, index: usize) -> Self {
        Self::new(node, PinKind::MaskInput, index)
    }
}

/// Directed arc from an output pin (`begin`) to an input or mask pin (`end`).
///
/// Node indices are shifted in place when a node is removed, so an `Edge`
/// is only meaningful together with the graph it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub begin: PinRef,
    pub end: PinRef,
}

impl Edge {
    pub fn touches(&self, node: usize) -> bool {
        self.begin.node == node || self.end.node == node
    }
}
