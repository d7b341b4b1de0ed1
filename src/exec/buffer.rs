// src/exec/buffer.rs

//! Image buffers produced by nodes, and the per-node slots that hold them.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::Generation;

/// A square-or-rectangular single-channel float image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ImageBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_data(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "image data length does not match {width}x{height}"
        );
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Nearest-neighbour lookup in normalised coordinates, so inputs of a
    /// different size can still be read.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let x = ((u * self.width as f32) as usize).min(self.width - 1);
        let y = ((v * self.height as f32) as usize).min(self.height - 1);
        self.get(x, y)
    }

    /// Content digest, used by the CLI summary.
    pub fn digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.width as u64).to_le_bytes());
        hasher.update(&(self.height as u64).to_le_bytes());
        for value in &self.data {
            hasher.update(&value.to_le_bytes());
        }
        hasher.finalize()
    }
}

/// Output storage owned by one node implementation: one buffer per output
/// pin, per generation.
///
/// Only the node's own job writes here (from its completion callback);
/// downstream nodes read through dependency resolution.
#[derive(Debug)]
pub struct OutputSlots {
    preview: RwLock<Vec<Option<Arc<ImageBuffer>>>>,
    full: RwLock<Vec<Option<Arc<ImageBuffer>>>>,
}

impl OutputSlots {
    pub fn new(outputs: usize) -> Self {
        Self {
            preview: RwLock::new(vec![None; outputs]),
            full: RwLock::new(vec![None; outputs]),
        }
    }

    fn slots(&self, generation: Generation) -> &RwLock<Vec<Option<Arc<ImageBuffer>>>> {
        match generation {
            Generation::Preview => &self.preview,
            Generation::Full => &self.full,
        }
    }

    pub fn get(&self, generation: Generation, pin: usize) -> Option<Arc<ImageBuffer>> {
        self.slots(generation).read().get(pin).cloned().flatten()
    }

    pub fn publish(&self, generation: Generation, pin: usize, image: ImageBuffer) {
        let mut slots = self.slots(generation).write();
        if pin >= slots.len() {
            slots.resize(pin + 1, None);
        }
        slots[pin] = Some(Arc::new(image));
    }

    pub fn clear(&self, generation: Generation) {
        for slot in self.slots(generation).write().iter_mut() {
            *slot = None;
        }
    }
}
