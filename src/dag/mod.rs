// src/dag/mod.rs

//! Dependency graph and build-state bookkeeping.
//!
//! - [`graph`] holds the node and edge tables and every structural mutation.
//! - [`node`] and [`edge`] define what is stored in those tables.
//! - [`traversal`] walks the graph up- or downstream and detects cycles.
//! - [`state_manager`] decides which nodes are buildable and records
//!   job outcomes on node flags.

pub mod edge;
pub mod graph;
pub mod node;
pub mod state_manager;
pub mod traversal;

pub use edge::{Edge, PinRef};
pub use graph::{DependencyGraph, NodeEdges, PinConnection, SharedGraph};
pub use node::{Node, NodeDescriptor, NodeFlags, NodeId, PinDescriptor, PinLayout};
pub use state_manager::{Completion, ReadOnlyStateManager, StateManager};
pub use traversal::{CycleChecker, Direction, GraphTraversal, Order};
