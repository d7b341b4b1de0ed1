// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::engine::CoordinatorSettings;
use crate::types::PinKind;

/// Graph file exactly as deserialised, before validation.
///
/// ```toml
/// [config]
/// workers = 4
/// full_resolution = 1024
///
/// [node.base]
/// type = "noise"
/// seed = 7
///
/// [node.inv]
/// type = "invert"
///
/// [[edge]]
/// from = "base"
/// to = "inv"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawGraphFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Keys are node names.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,

    #[serde(default)]
    pub edge: Vec<EdgeConfig>,
}

/// A validated graph file.
///
/// Only obtainable through `TryFrom<RawGraphFile>`, so holding one means
/// every edge names existing nodes and the edges form a DAG.
#[derive(Debug, Clone)]
pub struct GraphFile {
    pub config: ConfigSection,
    pub node: BTreeMap<String, NodeConfig>,
    pub edge: Vec<EdgeConfig>,
}

impl GraphFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        node: BTreeMap<String, NodeConfig>,
        edge: Vec<EdgeConfig>,
    ) -> Self {
        Self { config, node, edge }
    }

    /// Nodes with no outgoing edge.
    pub fn sink_nodes(&self) -> Vec<&str> {
        self.node
            .keys()
            .filter(|name| !self.edge.iter().any(|e| &e.from == *name))
            .map(String::as_str)
            .collect()
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Worker threads; `0` means one per available core.
    #[serde(default)]
    pub workers: usize,

    #[serde(default = "default_preview_resolution")]
    pub preview_resolution: usize,

    #[serde(default = "default_full_resolution")]
    pub full_resolution: usize,

    /// Image rows per work item.
    #[serde(default = "default_band_rows")]
    pub band_rows: usize,
}

fn default_preview_resolution() -> usize {
    CoordinatorSettings::default().preview_resolution
}

fn default_full_resolution() -> usize {
    CoordinatorSettings::default().full_resolution
}

fn default_band_rows() -> usize {
    CoordinatorSettings::default().band_rows
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: 0,
            preview_resolution: default_preview_resolution(),
            full_resolution: default_full_resolution(),
            band_rows: default_band_rows(),
        }
    }
}

impl ConfigSection {
    pub fn settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            preview_resolution: self.preview_resolution,
            full_resolution: self.full_resolution,
            band_rows: self.band_rows,
        }
    }
}

/// `[node.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Registry type name.
    #[serde(rename = "type")]
    pub node_type: String,

    /// Explicit stacking order; nodes without one are stacked in file order.
    #[serde(default)]
    pub z_order: Option<i32>,

    /// Every other key, handed to the node type's factory.
    #[serde(flatten)]
    pub params: toml::Table,
}

/// Which kind of pin an `[[edge]]` lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    #[default]
    Input,
    Mask,
}

impl From<EdgeKind> for PinKind {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Input => PinKind::Input,
            EdgeKind::Mask => PinKind::MaskInput,
        }
    }
}

/// One `[[edge]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeConfig {
    pub from: String,

    /// Output pin index on `from`.
    #[serde(default)]
    pub from_pin: usize,

    pub to: String,

    /// Pin index on `to`, counted within `kind`.
    #[serde(default)]
    pub pin: usize,

    #[serde(default)]
    pub kind: EdgeKind,
}
