use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which build generation a request (or a built flag) refers to.
///
/// - `Preview`: low resolution, used while editing.
/// - `Full`: final resolution.
///
/// Nodes track the two generations independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    Preview,
    Full,
}

impl Default for Generation {
    fn default() -> Self {
        Generation::Preview
    }
}

impl FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "preview" => Ok(Generation::Preview),
            "full" => Ok(Generation::Full),
            other => Err(format!(
                "invalid generation: {other} (expected \"preview\" or \"full\")"
            )),
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::Preview => f.write_str("preview"),
            Generation::Full => f.write_str("full"),
        }
    }
}

/// Generation(s) currently being built, as published by `BuildInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMask {
    None,
    Preview,
    Full,
    Both,
}

impl GenerationMask {
    pub(crate) const PREVIEW_BIT: u8 = 0b01;
    pub(crate) const FULL_BIT: u8 = 0b10;

    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & (Self::PREVIEW_BIT | Self::FULL_BIT) {
            0 => GenerationMask::None,
            Self::PREVIEW_BIT => GenerationMask::Preview,
            Self::FULL_BIT => GenerationMask::Full,
            _ => GenerationMask::Both,
        }
    }

    pub(crate) fn bit(generation: Generation) -> u8 {
        match generation {
            Generation::Preview => Self::PREVIEW_BIT,
            Generation::Full => Self::FULL_BIT,
        }
    }

    pub fn contains(self, generation: Generation) -> bool {
        matches!(
            (self, generation),
            (GenerationMask::Both, _)
                | (GenerationMask::Preview, Generation::Preview)
                | (GenerationMask::Full, Generation::Full)
        )
    }
}

/// The four kinds of connection point a node can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinKind {
    Input,
    Output,
    #[serde(rename = "parameter")]
    ParameterInput,
    #[serde(rename = "mask")]
    MaskInput,
}

impl PinKind {
    /// Pins an edge may terminate at.
    pub fn is_input_like(self) -> bool {
        matches!(self, PinKind::Input | PinKind::MaskInput)
    }
}

/// Bit set of data types a pin accepts or produces.
///
/// Two pins are compatible when their sets intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType(pub u32);

impl DataType {
    pub const HEIGHTMAP: DataType = DataType(1 << 0);
    pub const COLOR: DataType = DataType(1 << 1);
    pub const MASK: DataType = DataType(1 << 2);
    pub const SCALAR: DataType = DataType(1 << 3);
    pub const ANY: DataType = DataType(u32::MAX);

    pub fn union(self, other: DataType) -> DataType {
        DataType(self.0 | other.0)
    }

    pub fn intersects(self, other: DataType) -> bool {
        self.0 & other.0 != 0
    }
}

/// Broad grouping of node types, used for palette ordering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    Generator,
    Filter,
    Combiner,
    Output,
    Other,
}

impl Default for NodeCategory {
    fn default() -> Self {
        NodeCategory::Other
    }
}
