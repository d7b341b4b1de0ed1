// src/exec/backend.rs

//! The seam between the scheduler and the per-node algorithms.
//!
//! The coordinator never knows what a node computes. When a node becomes an
//! unbuilt root it resolves the node's connected inputs into a
//! [`ResolvedDependencies`] map and asks the node's [`NodeImplementation`]
//! for a [`BuildJob`]. Tests plug in recording or failing implementations;
//! the binary uses the ones in [`crate::nodes`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::BuildError;
use crate::exec::buffer::ImageBuffer;
use crate::exec::build_job::BuildJob;
use crate::types::{Generation, PinKind};

/// Upstream outputs for a building node, keyed by the *receiving*
/// `(pin kind, pin index)` on that node.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDependencies {
    inputs: BTreeMap<(PinKind, usize), Arc<ImageBuffer>>,
}

impl ResolvedDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: PinKind, index: usize, image: Arc<ImageBuffer>) {
        self.inputs.insert((kind, index), image);
    }

    pub fn get(&self, kind: PinKind, index: usize) -> Option<&Arc<ImageBuffer>> {
        self.inputs.get(&(kind, index))
    }

    pub fn input(&self, index: usize) -> Option<&Arc<ImageBuffer>> {
        self.get(PinKind::Input, index)
    }

    pub fn mask(&self, index: usize) -> Option<&Arc<ImageBuffer>> {
        self.get(PinKind::MaskInput, index)
    }

    /// Like [`Self::input`], but an error naming the pin if it is missing.
    pub fn require_input(&self, index: usize) -> Result<Arc<ImageBuffer>, BuildError> {
        self.input(index)
            .cloned()
            .ok_or_else(|| BuildError::new(format!("input pin {index} has no upstream output")))
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Everything a node needs to know to produce its job.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub generation: Generation,
    /// Edge length in pixels of the images produced for `generation`.
    pub resolution: usize,
    /// Rows per work item the scheduler would like jobs to use.
    pub band_rows: usize,
    pub inputs: ResolvedDependencies,
}

/// The one capability a node must provide to be schedulable.
///
/// Implementations own their output buffers; they are written only from
/// the node's own job and read by downstream nodes via [`Self::output`].
pub trait NodeImplementation: Send + Sync + fmt::Debug {
    /// Registry type name (e.g. `"noise"`).
    fn type_name(&self) -> &str;

    /// Produce the job that computes this node's outputs for `ctx`.
    fn make_build_job(&self, ctx: &BuildContext) -> Result<BuildJob, BuildError>;

    /// The output published for `generation` on output pin `pin`, if built.
    fn output(&self, generation: Generation, pin: usize) -> Option<Arc<ImageBuffer>>;

    /// Drop outputs for `generation` (called when the node is invalidated).
    fn discard_outputs(&self, _generation: Generation) {}
}
