#![allow(dead_code)]

use std::sync::Arc;

use nodeforge::engine::{BuildCoordinator, CoordinatorSettings};
use nodeforge::exec::WorkerPool;

pub use nodeforge_test_utils::builders::{GraphBuilder, TestGraph, raw_edges};
pub use nodeforge_test_utils::fake_nodes::{Behaviour, Event, EventLog, FakeNode, FakeSpec, Gate};
pub use nodeforge_test_utils::{init_tracing, with_timeout, within_timeout};

/// Small images so builds are fast.
pub fn test_settings() -> CoordinatorSettings {
    CoordinatorSettings {
        preview_resolution: 8,
        full_resolution: 16,
        band_rows: 4,
    }
}

/// Move the graph into a coordinator backed by a fresh `workers`-thread
/// pool. The returned `TestGraph` keeps the log and fake-node handles; its
/// `graph` field is left empty.
pub fn coordinator_for(mut test: TestGraph, workers: usize) -> (BuildCoordinator, TestGraph) {
    let graph = std::mem::take(&mut test.graph).into_shared();
    let pool = Arc::new(WorkerPool::new(workers).expect("worker pool"));
    (BuildCoordinator::new(graph, pool, test_settings()), test)
}

/// Built flag of `name` for `generation`, read under the graph lock.
pub fn is_built(
    coordinator: &BuildCoordinator,
    name: &str,
    generation: nodeforge::types::Generation,
) -> bool {
    let graph = coordinator.graph().lock();
    let index = graph.index_by_name(name).expect("node exists");
    graph.nodes()[index].is_built(generation)
}

pub fn progress_of(coordinator: &BuildCoordinator, name: &str) -> f32 {
    let graph = coordinator.graph().lock();
    let index = graph.index_by_name(name).expect("node exists");
    graph.nodes()[index].progress()
}
