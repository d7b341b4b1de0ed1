// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod nodes;
pub mod registry;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{AssembledGraph, GraphFile, assemble, load_and_validate};
use crate::dag::NodeId;
use crate::engine::{BuildCoordinator, BuildOutcome, BuildRequest};
use crate::exec::WorkerPool;
use crate::registry::NodeRegistry;
use crate::types::Generation;

/// What `run` did, for callers that want more than the printed summary.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// `None` for a dry run.
    pub outcome: Option<BuildOutcome>,
    pub targets: Vec<TargetSummary>,
}

/// Output 0 of one target after the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSummary {
    pub name: String,
    /// `None` if the target has no published output for the generation.
    pub dimensions: Option<(usize, usize)>,
    pub digest: Option<String>,
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - graph file loading and assembly
/// - the worker pool and build coordinator
/// - Ctrl-C handling (cancels the build)
/// - the output summary
pub async fn run(args: CliArgs) -> Result<RunReport> {
    let graph_path = PathBuf::from(&args.graph);
    let file = load_and_validate(&graph_path)
        .with_context(|| format!("loading graph file {}", graph_path.display()))?;

    let registry = NodeRegistry::with_builtins();
    let assembled = assemble(&file, &registry)?;
    let generation: Generation = args.generation.into();

    let target_names = select_targets(&args, &file);
    let targets: Vec<NodeId> = target_names
        .iter()
        .map(|name| assembled.id(name))
        .collect::<std::result::Result<_, _>>()?;
    info!(?target_names, %generation, "build targets selected");

    if args.dry_run {
        print_dry_run(&file, &assembled, &target_names, generation);
        return Ok(RunReport {
            outcome: None,
            targets: Vec::new(),
        });
    }

    let workers = args.workers.unwrap_or(file.config.workers);
    let pool = Arc::new(WorkerPool::new(workers)?);
    info!(workers = pool.thread_count(), "worker pool started");

    let coordinator = Arc::new(BuildCoordinator::new(
        assembled.graph.into_shared(),
        pool,
        file.config.settings(),
    ));
    coordinator.start_build(BuildRequest::new(generation, targets.iter().copied()))?;

    // Ctrl-C → cancel. `cancel` blocks until the build has stopped.
    let ctrl_c = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; cancelling build");
            let _ = tokio::task::spawn_blocking(move || coordinator.cancel()).await;
        })
    };

    let outcome = {
        let coordinator = Arc::clone(&coordinator);
        tokio::task::spawn_blocking(move || coordinator.wait())
            .await
            .context("coordinator wait task failed")?
            .unwrap_or(BuildOutcome::Cancelled)
    };
    ctrl_c.abort();

    let summaries = summarize(&coordinator, &target_names, &targets, generation);
    print_summary(&outcome, &summaries, generation);

    if let BuildOutcome::Failed(err) = &outcome {
        anyhow::bail!("build failed: {err}");
    }

    Ok(RunReport {
        outcome: Some(outcome),
        targets: summaries,
    })
}

/// Explicit `--target`s, else every node without outgoing edges.
fn select_targets(args: &CliArgs, file: &GraphFile) -> Vec<String> {
    if args.targets.is_empty() {
        file.sink_nodes().into_iter().map(str::to_string).collect()
    } else {
        args.targets.clone()
    }
}

fn summarize(
    coordinator: &BuildCoordinator,
    names: &[String],
    ids: &[NodeId],
    generation: Generation,
) -> Vec<TargetSummary> {
    let graph = coordinator.graph().lock();
    names
        .iter()
        .zip(ids)
        .map(|(name, id)| {
            let image = graph
                .index_of(*id)
                .and_then(|index| graph.node(index))
                .and_then(|node| node.implementation().output(generation, 0));
            TargetSummary {
                name: name.clone(),
                dimensions: image.as_ref().map(|img| (img.width(), img.height())),
                digest: image.as_ref().map(|img| img.digest().to_hex().to_string()),
            }
        })
        .collect()
}

fn print_summary(outcome: &BuildOutcome, summaries: &[TargetSummary], generation: Generation) {
    match outcome {
        BuildOutcome::Completed => println!("build completed ({generation})"),
        BuildOutcome::Cancelled => println!("build cancelled ({generation})"),
        BuildOutcome::Failed(err) => println!("build failed ({generation}): {err}"),
    }
    for summary in summaries {
        match (&summary.dimensions, &summary.digest) {
            (Some((w, h)), Some(digest)) => {
                println!("  {}: {w}x{h} blake3={digest}", summary.name)
            }
            _ => println!("  {}: (no output)", summary.name),
        }
    }
}

/// Print settings, nodes in draw order, edges and targets.
fn print_dry_run(
    file: &GraphFile,
    assembled: &AssembledGraph,
    targets: &[String],
    generation: Generation,
) {
    let graph = &assembled.graph;
    println!("nodeforge dry-run");
    println!("  config.workers = {}", file.config.workers);
    println!(
        "  config.preview_resolution = {}",
        file.config.preview_resolution
    );
    println!("  config.full_resolution = {}", file.config.full_resolution);
    println!("  config.band_rows = {}", file.config.band_rows);
    println!("  generation = {generation}");
    println!();

    println!("nodes ({}):", graph.len());
    for index in graph.draw_order() {
        let Some(node) = graph.node(index) else {
            continue;
        };
        println!(
            "  - {} [{}] z={}",
            node.name,
            node.implementation().type_name(),
            node.z_order
        );
        let deps: Vec<&str> = graph
            .dependencies_of(index)
            .filter_map(|d| graph.node(d).map(|n| n.name.as_str()))
            .collect();
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
    }
    println!();
    println!("targets: {targets:?}");

    debug!("dry-run complete (nothing built)");
}
