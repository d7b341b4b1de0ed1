// src/errors.rs

//! Crate-wide error types and aliases.
//!
//! - [`GraphError`] covers structural mutations of the dependency graph.
//!   Every variant is raised *after* the graph has been rolled back, so a
//!   caller never observes a half-applied mutation.
//! - [`BuildError`] is what a node implementation (or one of its work
//!   items) reports when it cannot produce its outputs.
//! - [`NodeforgeError`] wraps both plus the config / IO concerns of the
//!   binary.

use thiserror::Error;

use crate::types::PinKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("edge {from} -> {to} would introduce a cycle")]
    Cycle { from: String, to: String },

    #[error("cannot connect a {from:?} pin to a {to:?} pin")]
    IncompatiblePins { from: PinKind, to: PinKind },

    #[error("pin data types do not overlap ({from:#x} vs {to:#x})")]
    IncompatibleTypes { from: u32, to: u32 },

    #[error("node index {index} out of range (graph has {len} nodes)")]
    NodeOutOfRange { index: usize, len: usize },

    #[error("node '{node}' has no {kind:?} pin at index {index}")]
    PinOutOfRange {
        node: String,
        kind: PinKind,
        index: usize,
    },

    #[error("edge index {index} out of range (graph has {len} edges)")]
    EdgeOutOfRange { index: usize, len: usize },

    #[error("node not found: {0}")]
    NodeNotFound(String),
}

/// Raised when a node cannot produce (or finish) its build job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", describe(.node, .message))]
pub struct BuildError {
    pub node: Option<String>,
    pub message: String,
}

fn describe(node: &Option<String>, message: &str) -> String {
    match node {
        Some(node) => format!("node '{node}': {message}"),
        None => message.to_string(),
    }
}

impl BuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            node: None,
            message: message.into(),
        }
    }

    /// Attach the name of the node the error belongs to.
    pub fn for_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum NodeforgeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("a build is already active")]
    BuildAlreadyActive,

    #[error("no buildable targets left after sanity checks")]
    NoTargets,

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, NodeforgeError>;
