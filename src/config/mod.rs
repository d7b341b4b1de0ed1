// src/config/mod.rs

//! Graph files for the `nodeforge` binary.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a graph file from disk (`loader.rs`).
//! - Validate file-level invariants such as acyclicity (`validate.rs`).
//! - Assemble a validated file into a `DependencyGraph` (`assemble.rs`).

pub mod assemble;
pub mod loader;
pub mod model;
pub mod validate;

pub use assemble::{AssembledGraph, assemble};
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigSection, EdgeConfig, EdgeKind, GraphFile, NodeConfig, RawGraphFile};
pub use validate::validate_raw_graph;
