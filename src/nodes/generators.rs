// src/nodes/generators.rs

//! Nodes without inputs.

use std::sync::Arc;

use crate::dag::{PinDescriptor, PinLayout};
use crate::errors::BuildError;
use crate::exec::{BuildContext, BuildJob, ImageBuffer, NodeImplementation, OutputSlots};
use crate::nodes::banded::{banded_job, unit};
use crate::types::{DataType, Generation};

fn heightmap_output() -> PinLayout {
    PinLayout::new().output(PinDescriptor::new("out", DataType::HEIGHTMAP))
}

#[derive(Debug)]
pub struct ConstantNode {
    value: f32,
    slots: Arc<OutputSlots>,
}

impl ConstantNode {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            slots: Arc::new(OutputSlots::new(1)),
        }
    }

    pub fn pins() -> PinLayout {
        heightmap_output()
    }
}

impl NodeImplementation for ConstantNode {
    fn type_name(&self) -> &str {
        "constant"
    }

    fn make_build_job(&self, ctx: &BuildContext) -> Result<BuildJob, BuildError> {
        let value = self.value;
        Ok(banded_job(ctx, Arc::clone(&self.slots), move |_, _| value))
    }

    fn output(&self, generation: Generation, pin: usize) -> Option<Arc<ImageBuffer>> {
        self.slots.get(generation, pin)
    }

    fn discard_outputs(&self, generation: Generation) {
        self.slots.clear(generation);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientAxis {
    Horizontal,
    Vertical,
    Radial,
}

#[derive(Debug)]
pub struct GradientNode {
    axis: GradientAxis,
    slots: Arc<OutputSlots>,
}

impl GradientNode {
    pub fn new(axis: GradientAxis) -> Self {
        Self {
            axis,
            slots: Arc::new(OutputSlots::new(1)),
        }
    }

    pub fn pins() -> PinLayout {
        heightmap_output()
    }
}

impl NodeImplementation for GradientNode {
    fn type_name(&self) -> &str {
        "gradient"
    }

    fn make_build_job(&self, ctx: &BuildContext) -> Result<BuildJob, BuildError> {
        let axis = self.axis;
        let size = ctx.resolution;
        Ok(banded_job(ctx, Arc::clone(&self.slots), move |x, y| {
            let (u, v) = (unit(x, size), unit(y, size));
            match axis {
                GradientAxis::Horizontal => u,
                GradientAxis::Vertical => v,
                GradientAxis::Radial => {
                    let (dx, dy) = (u - 0.5, v - 0.5);
                    (1.0 - (dx * dx + dy * dy).sqrt() * 2.0).max(0.0)
                }
            }
        }))
    }

    fn output(&self, generation: Generation, pin: usize) -> Option<Arc<ImageBuffer>> {
        self.slots.get(generation, pin)
    }

    fn discard_outputs(&self, generation: Generation) {
        self.slots.clear(generation);
    }
}

/// Fractal value noise.
///
/// Sampled in normalised coordinates, so the preview and full generations
/// show the same features at different resolutions.
#[derive(Debug)]
pub struct NoiseNode {
    seed: u64,
    frequency: f32,
    octaves: u32,
    slots: Arc<OutputSlots>,
}

impl NoiseNode {
    pub fn new(seed: u64, frequency: f32, octaves: u32) -> Self {
        Self {
            seed,
            frequency,
            octaves: octaves.max(1),
            slots: Arc::new(OutputSlots::new(1)),
        }
    }

    pub fn pins() -> PinLayout {
        heightmap_output()
    }
}

impl NodeImplementation for NoiseNode {
    fn type_name(&self) -> &str {
        "noise"
    }

    fn make_build_job(&self, ctx: &BuildContext) -> Result<BuildJob, BuildError> {
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(BuildError::new(format!(
                "noise frequency must be positive (got {})",
                self.frequency
            )));
        }
        let (seed, frequency, octaves) = (self.seed, self.frequency, self.octaves);
        let size = ctx.resolution;
        Ok(banded_job(ctx, Arc::clone(&self.slots), move |x, y| {
            fractal_noise(seed, unit(x, size) * frequency, unit(y, size) * frequency, octaves)
        }))
    }

    fn output(&self, generation: Generation, pin: usize) -> Option<Arc<ImageBuffer>> {
        self.slots.get(generation, pin)
    }

    fn discard_outputs(&self, generation: Generation) {
        self.slots.clear(generation);
    }
}

fn lattice(seed: u64, x: i64, y: i64) -> f32 {
    // splitmix64 over the packed coordinates.
    let mut z = seed
        ^ (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z >> 40) as f32 / (1u64 << 24) as f32
}

fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn value_noise(seed: u64, x: f32, y: f32) -> f32 {
    let (x0, y0) = (x.floor(), y.floor());
    let (tx, ty) = (smooth(x - x0), smooth(y - y0));
    let (ix, iy) = (x0 as i64, y0 as i64);

    let a = lattice(seed, ix, iy);
    let b = lattice(seed, ix + 1, iy);
    let c = lattice(seed, ix, iy + 1);
    let d = lattice(seed, ix + 1, iy + 1);

    let top = a + (b - a) * tx;
    let bottom = c + (d - c) * tx;
    top + (bottom - top) * ty
}

fn fractal_noise(seed: u64, x: f32, y: f32, octaves: u32) -> f32 {
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    let mut norm = 0.0;
    let mut scale = 1.0;
    for octave in 0..octaves {
        sum += value_noise(seed.wrapping_add(octave as u64), x * scale, y * scale) * amplitude;
        norm += amplitude;
        amplitude *= 0.5;
        scale *= 2.0;
    }
    sum / norm
}
