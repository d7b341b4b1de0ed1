// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::Result;

/// Read and deserialise a graph file without semantic validation.
///
/// Use [`load_and_validate`] unless you need to inspect an invalid file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraphFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let raw: RawGraphFile = toml::from_str(&contents)?;
    debug!(
        path = %path.display(),
        nodes = raw.node.len(),
        edges = raw.edge.len(),
        "graph file parsed"
    );
    Ok(raw)
}

/// Read, deserialise and validate a graph file.
///
/// Validation checks global settings, edge endpoints, duplicate target
/// pins and acyclicity. Node types and pin indices are checked later, when
/// the file is assembled against a registry.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphFile> {
    let raw = load_from_path(&path)?;
    GraphFile::try_from(raw)
}

/// `Nodeforge.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Nodeforge.toml")
}
