// src/nodes/mod.rs

//! Built-in node implementations.
//!
//! These are ordinary [`NodeImplementation`](crate::exec::NodeImplementation)s;
//! the scheduler treats them exactly like user-supplied ones. All of them
//! split their image into row bands via [`banded::banded_job`].

pub mod banded;
pub mod combiners;
pub mod filters;
pub mod generators;

pub use combiners::{BlendMode, BlendNode};
pub use filters::{InvertNode, LevelsNode};
pub use generators::{ConstantNode, GradientAxis, GradientNode, NoiseNode};
