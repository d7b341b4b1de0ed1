// src/nodes/filters.rs

//! Single-input nodes.

use std::sync::Arc;

use crate::dag::{PinDescriptor, PinLayout};
use crate::errors::BuildError;
use crate::exec::{BuildContext, BuildJob, ImageBuffer, NodeImplementation, OutputSlots};
use crate::nodes::banded::{banded_job, unit};
use crate::types::{DataType, Generation};

fn filter_pins() -> PinLayout {
    PinLayout::new()
        .input(PinDescriptor::new("in", DataType::HEIGHTMAP.union(DataType::MASK)).mandatory())
        .output(PinDescriptor::new("out", DataType::HEIGHTMAP))
}

#[derive(Debug)]
pub struct InvertNode {
    slots: Arc<OutputSlots>,
}

impl InvertNode {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(OutputSlots::new(1)),
        }
    }

    pub fn pins() -> PinLayout {
        filter_pins()
    }
}

impl Default for InvertNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeImplementation for InvertNode {
    fn type_name(&self) -> &str {
        "invert"
    }

    fn make_build_job(&self, ctx: &BuildContext) -> Result<BuildJob, BuildError> {
        let input = ctx.inputs.require_input(0)?;
        let size = ctx.resolution;
        Ok(banded_job(ctx, Arc::clone(&self.slots), move |x, y| {
            1.0 - input.sample(unit(x, size), unit(y, size))
        }))
    }

    fn output(&self, generation: Generation, pin: usize) -> Option<Arc<ImageBuffer>> {
        self.slots.get(generation, pin)
    }

    fn discard_outputs(&self, generation: Generation) {
        self.slots.clear(generation);
    }
}

/// Linear remap of `[low, high]` onto `[0, 1]`, clamped.
#[derive(Debug)]
pub struct LevelsNode {
    low: f32,
    high: f32,
    slots: Arc<OutputSlots>,
}

impl LevelsNode {
    pub fn new(low: f32, high: f32) -> Self {
        Self {
            low,
            high,
            slots: Arc::new(OutputSlots::new(1)),
        }
    }

    pub fn pins() -> PinLayout {
        filter_pins()
    }
}

impl NodeImplementation for LevelsNode {
    fn type_name(&self) -> &str {
        "levels"
    }

    fn make_build_job(&self, ctx: &BuildContext) -> Result<BuildJob, BuildError> {
        if self.high <= self.low {
            return Err(BuildError::new(format!(
                "levels range is empty ({} >= {})",
                self.low, self.high
            )));
        }
        let input = ctx.inputs.require_input(0)?;
        let (low, span) = (self.low, self.high - self.low);
        let size = ctx.resolution;
        Ok(banded_job(ctx, Arc::clone(&self.slots), move |x, y| {
            ((input.sample(unit(x, size), unit(y, size)) - low) / span).clamp(0.0, 1.0)
        }))
    }

    fn output(&self, generation: Generation, pin: usize) -> Option<Arc<ImageBuffer>> {
        self.slots.get(generation, pin)
    }

    fn discard_outputs(&self, generation: Generation) {
        self.slots.clear(generation);
    }
}
