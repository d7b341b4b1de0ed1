// src/logging.rs

//! Logging setup for the `nodeforge` binary.
//!
//! `--log-level` wins. Otherwise `NODEFORGE_LOG` is read as a full
//! `EnvFilter` directive list, so per-module levels work, e.g.
//! `NODEFORGE_LOG=nodeforge::engine=debug,info`. An unparsable value falls
//! back to `info` and is reported once the subscriber is installed.
//!
//! Logs go to stderr; stdout carries the build summary.

use anyhow::{Result, anyhow};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "NODEFORGE_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let (filter, rejected) = log_filter(cli_level, env.as_deref());

    // Coordinator and worker threads are named.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    if let Some(value) = rejected {
        warn!(%value, "ignoring invalid {LOG_ENV}; logging at {DEFAULT_DIRECTIVE}");
    }
    Ok(())
}

/// The filter to install, and the environment value if it was rejected.
pub fn log_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> (EnvFilter, Option<String>) {
    if let Some(level) = cli_level {
        return (EnvFilter::new(level.as_str()), None);
    }

    match env.map(str::trim).filter(|v| !v.is_empty()) {
        None => (EnvFilter::new(DEFAULT_DIRECTIVE), None),
        Some(value) => match EnvFilter::try_new(value) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_DIRECTIVE), Some(value.to_string())),
        },
    }
}
