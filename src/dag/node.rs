// src/dag/node.rs

//! Nodes, their pins, and their mutable build flags.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::exec::NodeImplementation;
use crate::types::{DataType, Generation, NodeCategory, PinKind};

/// Process-wide unique node identity (random 128-bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinDescriptor {
    pub name: String,
    pub data_type: DataType,
    pub mandatory: bool,
}

impl PinDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            mandatory: false,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

/// The fixed set of pins a node declares, one list per pin kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinLayout {
    pub inputs: Vec<PinDescriptor>,
    pub outputs: Vec<PinDescriptor>,
    pub parameters: Vec<PinDescriptor>,
    pub masks: Vec<PinDescriptor>,
}

impl PinLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, pin: PinDescriptor) -> Self {
        self.inputs.push(pin);
        self
    }

    pub fn output(mut self, pin: PinDescriptor) -> Self {
        self.outputs.push(pin);
        self
    }

    pub fn parameter(mut self, pin: PinDescriptor) -> Self {
        self.parameters.push(pin);
        self
    }

    pub fn mask(mut self, pin: PinDescriptor) -> Self {
        self.masks.push(pin);
        self
    }

    pub fn pins(&self, kind: PinKind) -> &[PinDescriptor] {
        match kind {
            PinKind::Input => &self.inputs,
            PinKind::Output => &self.outputs,
            PinKind::ParameterInput => &self.parameters,
            PinKind::MaskInput => &self.masks,
        }
    }

    pub fn pin(&self, kind: PinKind, index: usize) -> Option<&PinDescriptor> {
        self.pins(kind).get(index)
    }
}

/// Mutable per-node state read by the UI and written by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags {
    pub selected: bool,
    pub building: bool,
    /// Built for the full-resolution generation.
    pub built: bool,
    pub preview_built: bool,
    /// Invalidated while its job was in flight; that job's result is
    /// discarded when it completes.
    pub stale: bool,
}

impl NodeFlags {
    pub fn is_built(&self, generation: Generation) -> bool {
        match generation {
            Generation::Preview => self.preview_built,
            Generation::Full => self.built,
        }
    }

    pub fn set_built(&mut self, generation: Generation, built: bool) {
        match generation {
            Generation::Preview => self.preview_built = built,
            Generation::Full => self.built = built,
        }
    }
}

/// What a caller supplies to `DependencyGraph::add_node`.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    pub name: String,
    pub category: NodeCategory,
    pub pins: PinLayout,
    pub implementation: Arc<dyn NodeImplementation>,
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    pub name: String,
    pub category: NodeCategory,
    pub z_order: i32,
    pins: PinLayout,
    pub flags: NodeFlags,
    progress: f32,
    implementation: Arc<dyn NodeImplementation>,
}

impl Node {
    pub(crate) fn from_descriptor(descriptor: NodeDescriptor, z_order: i32) -> Self {
        Self {
            id: NodeId::new(),
            name: descriptor.name,
            category: descriptor.category,
            z_order,
            pins: descriptor.pins,
            flags: NodeFlags::default(),
            progress: 0.0,
            implementation: descriptor.implementation,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn pins(&self) -> &PinLayout {
        &self.pins
    }

    pub fn implementation(&self) -> &Arc<dyn NodeImplementation> {
        &self.implementation
    }

    /// Build progress of the current job, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn set_progress(&mut self, progress: f32) {
        self.progress = progress.clamp(0.0, 1.0);
    }

    pub fn is_built(&self, generation: Generation) -> bool {
        self.flags.is_built(generation)
    }
}
