// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::Generation;

/// Command-line arguments for `nodeforge`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "nodeforge",
    version,
    about = "Build the outputs of a node graph incrementally on a worker pool.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the graph file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Nodeforge.toml")]
    pub graph: String,

    /// Which generation to build.
    #[arg(long, value_enum, default_value = "preview")]
    pub generation: GenerationArg,

    /// Node to build (repeatable). Defaults to every node without
    /// outgoing edges.
    #[arg(long = "target", value_name = "NAME")]
    pub targets: Vec<String>,

    /// Worker threads; overrides `[config].workers`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `NODEFORGE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse, validate and assemble the graph, print it, but build nothing.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum GenerationArg {
    Preview,
    Full,
}

impl From<GenerationArg> for Generation {
    fn from(arg: GenerationArg) -> Self {
        match arg {
            GenerationArg::Preview => Generation::Preview,
            GenerationArg::Full => Generation::Full,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
