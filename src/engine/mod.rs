// src/engine/mod.rs

//! Build orchestration.
//!
//! This module ties together:
//! - the dependency graph and its build flags
//! - the worker pool that runs node jobs
//! - the coordinator thread that decides what to build next and reacts to
//!   job completion, job failure and cancel requests
//!
//! The pure decisions live in [`core`]; the threaded shell is implemented
//! in [`coordinator`].

use crate::dag::NodeId;
use crate::errors::BuildError;
use crate::types::Generation;

/// A request to build `targets` (and everything upstream of them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub generation: Generation,
    pub targets: Vec<NodeId>,
}

impl BuildRequest {
    pub fn new(generation: Generation, targets: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            generation,
            targets: targets.into_iter().collect(),
        }
    }

    pub fn preview(targets: impl IntoIterator<Item = NodeId>) -> Self {
        Self::new(Generation::Preview, targets)
    }

    pub fn full(targets: impl IntoIterator<Item = NodeId>) -> Self {
        Self::new(Generation::Full, targets)
    }
}

/// How a build ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Every target-reachable node is built.
    Completed,
    /// A cancel request stopped the build.
    Cancelled,
    /// A node could not produce its job, or one of its work items failed.
    Failed(BuildError),
}

/// Resolution and job-shaping knobs passed to node implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub preview_resolution: usize,
    pub full_resolution: usize,
    pub band_rows: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            preview_resolution: 128,
            full_resolution: 512,
            band_rows: 16,
        }
    }
}

impl CoordinatorSettings {
    pub fn resolution(&self, generation: Generation) -> usize {
        match generation {
            Generation::Preview => self.preview_resolution,
            Generation::Full => self.full_resolution,
        }
    }
}

pub mod build_info;
pub mod coordinator;
pub mod core;
pub mod sanity;

pub use self::build_info::{BuildInfo, PROGRESS_SCALE};
pub use self::coordinator::BuildCoordinator;
pub use self::core::{CoordinatorState, StartDecision, plan_start};
pub use self::sanity::{PrunedTargets, sanitize_targets};
