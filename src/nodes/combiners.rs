// src/nodes/combiners.rs

use std::str::FromStr;
use std::sync::Arc;

use crate::dag::{PinDescriptor, PinLayout};
use crate::errors::BuildError;
use crate::exec::{BuildContext, BuildJob, ImageBuffer, NodeImplementation, OutputSlots};
use crate::nodes::banded::{banded_job, unit};
use crate::types::{DataType, Generation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Mix,
    Add,
    Multiply,
    Max,
    Min,
}

impl FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mix" => Ok(BlendMode::Mix),
            "add" => Ok(BlendMode::Add),
            "multiply" => Ok(BlendMode::Multiply),
            "max" => Ok(BlendMode::Max),
            "min" => Ok(BlendMode::Min),
            other => Err(format!(
                "invalid blend mode: {other} (expected mix, add, multiply, max or min)"
            )),
        }
    }
}

impl BlendMode {
    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BlendMode::Mix => b,
            BlendMode::Add => (a + b).min(1.0),
            BlendMode::Multiply => a * b,
            BlendMode::Max => a.max(b),
            BlendMode::Min => a.min(b),
        }
    }
}

/// Two mandatory inputs, one optional mask.
///
/// `out = lerp(a, mode(a, b), factor * mask)`; without a mask the mask is 1.
#[derive(Debug)]
pub struct BlendNode {
    mode: BlendMode,
    factor: f32,
    slots: Arc<OutputSlots>,
}

impl BlendNode {
    pub fn new(mode: BlendMode, factor: f32) -> Self {
        Self {
            mode,
            factor: factor.clamp(0.0, 1.0),
            slots: Arc::new(OutputSlots::new(1)),
        }
    }

    pub fn pins() -> PinLayout {
        PinLayout::new()
            .input(PinDescriptor::new("a", DataType::HEIGHTMAP).mandatory())
            .input(PinDescriptor::new("b", DataType::HEIGHTMAP).mandatory())
            .mask(PinDescriptor::new("mask", DataType::MASK.union(DataType::HEIGHTMAP)))
            .output(PinDescriptor::new("out", DataType::HEIGHTMAP))
    }
}

impl NodeImplementation for BlendNode {
    fn type_name(&self) -> &str {
        "blend"
    }

    fn make_build_job(&self, ctx: &BuildContext) -> Result<BuildJob, BuildError> {
        let a = ctx.inputs.require_input(0)?;
        let b = ctx.inputs.require_input(1)?;
        let mask = ctx.inputs.mask(0).cloned();
        let (mode, factor) = (self.mode, self.factor);
        let size = ctx.resolution;

        Ok(banded_job(ctx, Arc::clone(&self.slots), move |x, y| {
            let (u, v) = (unit(x, size), unit(y, size));
            let (va, vb) = (a.sample(u, v), b.sample(u, v));
            let weight = factor * mask.as_ref().map_or(1.0, |m| m.sample(u, v));
            va + (mode.apply(va, vb) - va) * weight
        }))
    }

    fn output(&self, generation: Generation, pin: usize) -> Option<Arc<ImageBuffer>> {
        self.slots.get(generation, pin)
    }

    fn discard_outputs(&self, generation: Generation) {
        self.slots.clear(generation);
    }
}
