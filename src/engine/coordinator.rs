// src/engine/coordinator.rs

//! The build coordinator thread.
//!
//! One dedicated thread per build runs the [`CoordinatorState`] machine:
//!
//! - `Start`: ask the graph for unbuilt roots (see [`plan_start`]), mark
//!   them building, turn each into a job group on the worker pool, then
//!   go to `Sleep`.
//! - `Sleep`: block on the wake condition variable. A finishing job sets
//!   `wake_pending` and re-enters `Start`; a cancel request or a job
//!   failure leads to `CancelBuild`.
//! - `CancelBuild`: drain the pool, clear building flags and progress,
//!   report the outcome, exit.
//! - `Finished`: report success, exit.
//!
//! Node flags are only touched with the graph lock held. The coordinator
//! never holds the graph lock or its own control lock while calling into
//! the pool, because job callbacks take both.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::dag::{Completion, NodeId, ReadOnlyStateManager, SharedGraph, StateManager};
use crate::engine::build_info::BuildInfo;
use crate::engine::core::{CoordinatorState, StartDecision, build_size, plan_start, target_indices};
use crate::engine::sanity::sanitize_targets;
use crate::engine::{BuildOutcome, BuildRequest, CoordinatorSettings};
use crate::errors::{BuildError, NodeforgeError, Result};
use crate::exec::{BuildContext, BuildJob, NodeImplementation, WorkerPool};
use crate::types::Generation;

#[derive(Debug)]
struct ControlState {
    phase: CoordinatorState,
    active: bool,
    wake_pending: bool,
    cancel_requested: bool,
    /// First job failure of the active build.
    failure: Option<BuildError>,
    in_flight: usize,
    last_outcome: Option<BuildOutcome>,
}

#[derive(Debug)]
struct Control {
    state: Mutex<ControlState>,
    /// The coordinator sleeps on this.
    wake: Condvar,
    /// External waiters sleep on this until no build is active.
    main: Condvar,
}

impl Control {
    fn new() -> Self {
        Self {
            state: Mutex::new(ControlState {
                phase: CoordinatorState::Finished,
                active: false,
                wake_pending: false,
                cancel_requested: false,
                failure: None,
                in_flight: 0,
                last_outcome: None,
            }),
            wake: Condvar::new(),
            main: Condvar::new(),
        }
    }

    fn job_finished(&self, failure: Option<BuildError>) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if let Some(err) = failure {
            if !state.cancel_requested && state.failure.is_none() {
                state.failure = Some(err);
            }
        }
        state.wake_pending = true;
        self.wake.notify_one();
    }
}

/// Owns the worker pool handle and runs at most one build at a time.
pub struct BuildCoordinator {
    graph: SharedGraph,
    pool: Arc<WorkerPool>,
    info: Arc<BuildInfo>,
    control: Arc<Control>,
    settings: CoordinatorSettings,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for BuildCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildCoordinator")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl BuildCoordinator {
    pub fn new(graph: SharedGraph, pool: Arc<WorkerPool>, settings: CoordinatorSettings) -> Self {
        Self {
            graph,
            pool,
            info: Arc::new(BuildInfo::new()),
            control: Arc::new(Control::new()),
            settings,
            thread: Mutex::new(None),
        }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn build_info(&self) -> Arc<BuildInfo> {
        Arc::clone(&self.info)
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Last state the coordinator thread entered.
    pub fn state(&self) -> CoordinatorState {
        self.control.state.lock().phase
    }

    pub fn is_building(&self) -> bool {
        self.control.state.lock().active
    }

    /// Start a build on a fresh coordinator thread and return immediately.
    ///
    /// Fails with [`NodeforgeError::BuildAlreadyActive`] while another build
    /// runs, and with [`NodeforgeError::NoTargets`] if the sanity checks
    /// drop every target.
    pub fn start_build(&self, request: BuildRequest) -> Result<()> {
        {
            let mut state = self.control.state.lock();
            if state.active {
                warn!("build requested while another build is active; rejecting");
                return Err(NodeforgeError::BuildAlreadyActive);
            }
            // Reset under the same lock that claims the build, so a cancel
            // arriving while the build is prepared is never overwritten.
            state.active = true;
            state.phase = CoordinatorState::Start;
            state.wake_pending = false;
            state.cancel_requested = false;
            state.failure = None;
            state.in_flight = 0;
            state.last_outcome = None;
        }
        self.join_thread();

        let prepared = {
            let graph = self.graph.lock();
            let pruned = sanitize_targets(&graph, &request.targets);
            let indices = target_indices(&graph, &pruned.kept);
            let (total, built) = build_size(&graph, request.generation, &indices);
            (pruned.kept, total, built)
        };
        let (targets, total, built) = prepared;

        if targets.is_empty() {
            let mut state = self.control.state.lock();
            state.active = false;
            self.control.main.notify_all();
            return Err(NodeforgeError::NoTargets);
        }

        info!(
            generation = %request.generation,
            targets = targets.len(),
            nodes = total,
            already_built = built,
            "starting build"
        );
        self.info
            .begin(request.generation, built as f32 / total.max(1) as f32);

        let worker = CoordinatorThread {
            graph: Arc::clone(&self.graph),
            pool: Arc::clone(&self.pool),
            info: Arc::clone(&self.info),
            control: Arc::clone(&self.control),
            generation: request.generation,
            resolution: self.settings.resolution(request.generation),
            band_rows: self.settings.band_rows,
            targets,
            total_nodes: total.max(1),
        };

        let spawned = thread::Builder::new()
            .name("nodeforge-coordinator".to_string())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                *self.thread.lock() = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.info.reset();
                let mut state = self.control.state.lock();
                state.active = false;
                self.control.main.notify_all();
                Err(err.into())
            }
        }
    }

    /// Block until no build is active; returns the last build's outcome.
    pub fn wait(&self) -> Option<BuildOutcome> {
        let outcome = {
            let mut state = self.control.state.lock();
            while state.active {
                self.control.main.wait(&mut state);
            }
            state.last_outcome.clone()
        };
        self.join_thread();
        outcome
    }

    /// Start a build and wait for it.
    pub fn build_blocking(&self, request: BuildRequest) -> Result<BuildOutcome> {
        self.start_build(request)?;
        Ok(self.wait().unwrap_or(BuildOutcome::Cancelled))
    }

    /// Request cancellation and block until the build has fully stopped.
    ///
    /// Does nothing if no build is active.
    pub fn cancel(&self) -> Option<BuildOutcome> {
        {
            let mut state = self.control.state.lock();
            if !state.active {
                return None;
            }
            info!("build cancellation requested");
            state.cancel_requested = true;
            self.control.wake.notify_one();
        }
        self.wait()
    }

    fn join_thread(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("coordinator thread panicked");
            }
        }
    }
}

impl Drop for BuildCoordinator {
    fn drop(&mut self) {
        self.cancel();
        self.join_thread();
    }
}

/// Everything the coordinator thread needs for one build.
struct CoordinatorThread {
    graph: SharedGraph,
    pool: Arc<WorkerPool>,
    info: Arc<BuildInfo>,
    control: Arc<Control>,
    generation: Generation,
    resolution: usize,
    band_rows: usize,
    targets: Vec<NodeId>,
    total_nodes: usize,
}

/// A root picked in `Start`, with what its implementation needs.
struct PreparedRoot {
    id: NodeId,
    name: String,
    implementation: Arc<dyn NodeImplementation>,
    context: BuildContext,
}

impl CoordinatorThread {
    fn run(self) {
        debug!(generation = %self.generation, "coordinator thread started");
        let mut phase = CoordinatorState::Start;

        loop {
            self.control.state.lock().phase = phase;
            phase = match phase {
                CoordinatorState::Start => self.on_start(),
                CoordinatorState::Sleep => self.on_sleep(),
                CoordinatorState::CancelBuild => {
                    self.on_cancel();
                    break;
                }
                CoordinatorState::Finished => {
                    self.on_finished();
                    break;
                }
            };
        }

        debug!("coordinator thread exiting");
    }

    fn on_sleep(&self) -> CoordinatorState {
        let mut state = self.control.state.lock();
        loop {
            if state.cancel_requested || state.failure.is_some() {
                return CoordinatorState::CancelBuild;
            }
            if state.wake_pending {
                state.wake_pending = false;
                return CoordinatorState::Start;
            }
            self.control.wake.wait(&mut state);
        }
    }

    fn on_start(&self) -> CoordinatorState {
        {
            let state = self.control.state.lock();
            if state.cancel_requested || state.failure.is_some() {
                return CoordinatorState::CancelBuild;
            }
        }

        let roots = {
            let mut graph = self.graph.lock();
            let targets = target_indices(&graph, &self.targets);
            let decision = plan_start(&ReadOnlyStateManager::new(&graph, self.generation), &targets);

            let roots = match decision {
                StartDecision::Finished => return CoordinatorState::Finished,
                StartDecision::Sleep => return CoordinatorState::Sleep,
                StartDecision::Dispatch(roots) => roots,
            };

            let mut prepared = Vec::with_capacity(roots.len());
            for index in roots {
                let inputs = {
                    let mut manager = StateManager::new(&mut graph, self.generation);
                    manager.mark_building(index);
                    manager.resolve_dependencies(index)
                };
                let node = &graph.nodes()[index];
                prepared.push(PreparedRoot {
                    id: node.id(),
                    name: node.name.clone(),
                    implementation: Arc::clone(node.implementation()),
                    context: BuildContext {
                        generation: self.generation,
                        resolution: self.resolution,
                        band_rows: self.band_rows,
                        inputs,
                    },
                });
            }
            prepared
        };

        let names: Vec<&str> = roots.iter().map(|r| r.name.as_str()).collect();
        debug!(?names, "dispatching unbuilt roots");

        for root in &roots {
            match root.implementation.make_build_job(&root.context) {
                Ok(job) => self.submit(root, job),
                Err(err) => {
                    let err = if err.node.is_none() {
                        err.for_node(root.name.clone())
                    } else {
                        err
                    };
                    error!(node = %root.name, error = %err, "node could not create its build job; aborting build");
                    let mut state = self.control.state.lock();
                    if state.failure.is_none() {
                        state.failure = Some(err);
                    }
                    return CoordinatorState::CancelBuild;
                }
            }
        }

        CoordinatorState::Sleep
    }

    /// Wire per-node bookkeeping into `job` and hand it to the pool.
    fn submit(&self, root: &PreparedRoot, mut job: BuildJob) {
        let items = job.item_count();
        let item_share = 1.0 / items.max(1) as f32;
        let first_error: Arc<Mutex<Option<BuildError>>> = Arc::new(Mutex::new(None));

        {
            let graph = Arc::clone(&self.graph);
            let info = Arc::clone(&self.info);
            let first_error = Arc::clone(&first_error);
            let (id, name, generation) = (root.id, root.name.clone(), self.generation);
            let global_share = item_share / self.total_nodes as f32;

            job.wrap_items(move |item| {
                let graph = Arc::clone(&graph);
                let info = Arc::clone(&info);
                let first_error = Arc::clone(&first_error);
                let name = name.clone();
                Box::new(move || {
                    let result = item();
                    match &result {
                        Ok(()) => {
                            StateManager::new(&mut graph.lock(), generation)
                                .add_progress(id, item_share);
                            info.add_progress(global_share);
                        }
                        Err(err) => {
                            let mut slot = first_error.lock();
                            if slot.is_none() {
                                let err = if err.node.is_none() {
                                    err.clone().for_node(name)
                                } else {
                                    err.clone()
                                };
                                *slot = Some(err);
                            }
                        }
                    }
                    result
                })
            });
        }

        {
            let graph = Arc::clone(&self.graph);
            let info = Arc::clone(&self.info);
            let control = Arc::clone(&self.control);
            let (id, name, generation) = (root.id, root.name.clone(), self.generation);
            let node_share = 1.0 / self.total_nodes as f32;

            job.then_complete(move || {
                match StateManager::new(&mut graph.lock(), generation).mark_built(id) {
                    Completion::Built => {}
                    Completion::Stale => {
                        info!(node = %name, "node changed while building; it will be rebuilt")
                    }
                    Completion::Missing => warn!(node = %name, "built node no longer in graph"),
                }
                if items == 0 {
                    info.add_progress(node_share);
                }
                debug!(node = %name, "build job completed");
                control.job_finished(None);
            });
        }

        {
            let graph = Arc::clone(&self.graph);
            let control = Arc::clone(&self.control);
            let (id, name, generation) = (root.id, root.name.clone(), self.generation);

            job.then_failure(move || {
                StateManager::new(&mut graph.lock(), generation).mark_failed(id);
                let failure = first_error
                    .lock()
                    .take()
                    .unwrap_or_else(|| BuildError::new("build job failed").for_node(name.clone()));
                debug!(node = %name, error = %failure, "build job did not complete");
                control.job_finished(Some(failure));
            });
        }

        self.control.state.lock().in_flight += 1;
        self.pool.submit_group(root.name.clone(), job);
    }

    fn on_cancel(&self) {
        info!("cancelling build; draining worker pool");
        self.pool.cancel_current_tasks();

        let reset = StateManager::new(&mut self.graph.lock(), self.generation).reset_in_flight();
        self.info.reset();

        let failure = self.control.state.lock().failure.clone();
        let outcome = match failure {
            Some(err) => {
                warn!(error = %err, reset, "build aborted");
                BuildOutcome::Failed(err)
            }
            None => {
                info!(reset, "build cancelled");
                BuildOutcome::Cancelled
            }
        };
        self.finish(outcome);
    }

    fn on_finished(&self) {
        self.info.reset();
        info!(generation = %self.generation, "build finished");
        self.finish(BuildOutcome::Completed);
    }

    fn finish(&self, outcome: BuildOutcome) {
        let mut state = self.control.state.lock();
        state.active = false;
        state.in_flight = 0;
        state.last_outcome = Some(outcome);
        self.control.main.notify_all();
    }
}
