mod common;

use std::fs;
use std::path::Path;

use clap::Parser;
use tempfile::TempDir;

use crate::common::{init_tracing, with_timeout};

use nodeforge::cli::{CliArgs, GenerationArg};
use nodeforge::engine::BuildOutcome;
use nodeforge::run;

const GRAPH: &str = r#"
[config]
workers = 2
preview_resolution = 8
full_resolution = 16
band_rows = 3

[node.height]
type = "noise"
seed = 3

[node.ramp]
type = "gradient"

[node.combined]
type = "blend"
mode = "max"

[node.flipped]
type = "invert"

[[edge]]
from = "height"
to = "combined"

[[edge]]
from = "ramp"
to = "combined"
pin = 1

[[edge]]
from = "ramp"
to = "flipped"
"#;

fn graph_dir(contents: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Nodeforge.toml"), contents).unwrap();
    dir
}

fn args(dir: &Path, extra: &[&str]) -> CliArgs {
    let graph = dir.join("Nodeforge.toml");
    let mut argv = vec![
        "nodeforge".to_string(),
        "--graph".to_string(),
        graph.display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    CliArgs::try_parse_from(argv).unwrap()
}

#[test]
fn test_cli_defaults() {
    let args = CliArgs::try_parse_from(["nodeforge"]).unwrap();
    assert_eq!(args.graph, "Nodeforge.toml");
    assert_eq!(args.generation, GenerationArg::Preview);
    assert!(args.targets.is_empty());
    assert!(args.workers.is_none());
    assert!(!args.dry_run);

    let args = CliArgs::try_parse_from([
        "nodeforge",
        "--generation",
        "full",
        "--target",
        "a",
        "--target",
        "b",
        "--workers",
        "3",
    ])
    .unwrap();
    assert_eq!(args.generation, GenerationArg::Full);
    assert_eq!(args.targets, vec!["a", "b"]);
    assert_eq!(args.workers, Some(3));

    assert!(CliArgs::try_parse_from(["nodeforge", "--generation", "draft"]).is_err());
}

#[tokio::test]
async fn test_dry_run_builds_nothing() {
    init_tracing();
    let dir = graph_dir(GRAPH);

    let report = with_timeout(run(args(dir.path(), &["--dry-run"])))
        .await
        .unwrap();

    assert!(report.outcome.is_none());
    assert!(report.targets.is_empty());
}

#[tokio::test]
async fn test_run_builds_sink_nodes_by_default() {
    init_tracing();
    let dir = graph_dir(GRAPH);

    let report = with_timeout(run(args(dir.path(), &[]))).await.unwrap();

    assert_eq!(report.outcome, Some(BuildOutcome::Completed));
    let names: Vec<&str> = report.targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["combined", "flipped"]);
    for target in &report.targets {
        assert_eq!(target.dimensions, Some((8, 8)));
        let digest = target.digest.as_deref().unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#[tokio::test]
async fn test_run_full_generation_for_explicit_target() {
    let dir = graph_dir(GRAPH);

    let report = with_timeout(run(args(
        dir.path(),
        &["--generation", "full", "--target", "ramp", "--workers", "1"],
    )))
    .await
    .unwrap();

    assert_eq!(report.outcome, Some(BuildOutcome::Completed));
    assert_eq!(report.targets.len(), 1);
    assert_eq!(report.targets[0].name, "ramp");
    assert_eq!(report.targets[0].dimensions, Some((16, 16)));
}

#[tokio::test]
async fn test_same_graph_gives_same_digests() {
    let first = graph_dir(GRAPH);
    let second = graph_dir(GRAPH);

    let a = with_timeout(run(args(first.path(), &[]))).await.unwrap();
    let b = with_timeout(run(args(second.path(), &[]))).await.unwrap();

    assert_eq!(a.targets, b.targets);
}

#[tokio::test]
async fn test_unknown_target_is_an_error() {
    let dir = graph_dir(GRAPH);

    let err = with_timeout(run(args(dir.path(), &["--target", "nope"])))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("nope"));
}

#[tokio::test]
async fn test_failed_build_is_an_error() {
    init_tracing();
    let dir = graph_dir(
        r#"
[node.c]
type = "constant"

[node.lv]
type = "levels"
low = 1.0
high = 0.0

[[edge]]
from = "c"
to = "lv"
"#,
    );

    let err = with_timeout(run(args(dir.path(), &[])))
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("build failed"), "{msg}");
    assert!(msg.contains("levels range is empty"), "{msg}");
}

#[tokio::test]
async fn test_missing_graph_file_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();

    let err = with_timeout(run(args(dir.path(), &[])))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Nodeforge.toml"));
}
