// src/engine/build_info.rs

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::types::{Generation, GenerationMask};

/// Fixed-point scale of the global progress counter (`1.0 == SCALE`).
pub const PROGRESS_SCALE: u32 = 1 << 24;

/// Global build summary shared with the UI.
///
/// Written by the coordinator (and by worker progress updates), readable
/// from any thread without taking the graph lock.
#[derive(Debug, Default)]
pub struct BuildInfo {
    generation: AtomicU8,
    progress: AtomicU32,
}

impl BuildInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> GenerationMask {
        GenerationMask::from_bits(self.generation.load(Ordering::Acquire))
    }

    pub fn is_building(&self) -> bool {
        self.generation() != GenerationMask::None
    }

    /// Progress of the active build in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.progress.load(Ordering::Acquire) as f32 / PROGRESS_SCALE as f32
    }

    pub(crate) fn begin(&self, generation: Generation, initial_progress: f32) {
        self.set_progress(initial_progress);
        self.generation
            .fetch_or(GenerationMask::bit(generation), Ordering::AcqRel);
    }

    pub(crate) fn set_progress(&self, progress: f32) {
        let scaled = (progress.clamp(0.0, 1.0) * PROGRESS_SCALE as f32) as u32;
        self.progress.store(scaled, Ordering::Release);
    }

    /// Add `delta` (a fraction of the whole build), saturating at 1.0.
    pub(crate) fn add_progress(&self, delta: f32) {
        let scaled = (delta.max(0.0) * PROGRESS_SCALE as f32) as u32;
        let _ = self
            .progress
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(scaled).min(PROGRESS_SCALE))
            });
    }

    /// Back to "no build": generation none, progress zero.
    pub(crate) fn reset(&self) {
        self.generation.store(0, Ordering::Release);
        self.progress.store(0, Ordering::Release);
    }
}
