// src/exec/worker_pool.rs

//! Fixed-size pool of worker threads over a shared FIFO queue.
//!
//! - [`WorkerPool::submit`] queues a single fire-and-forget item.
//! - [`WorkerPool::submit_group`] queues every item of a [`BuildJob`] and
//!   tracks them as one [`JobGroup`].
//! - [`WorkerPool::cancel_current_tasks`] discards everything still queued
//!   (routing grouped items through their group's failure path) and then
//!   waits for the items that already started.
//! - [`WorkerPool::wait_for_current_tasks`] blocks until nothing is open.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use crate::errors::Result;
use crate::exec::build_job::{BuildJob, WorkItem};
use crate::exec::job_group::{GroupHandle, GroupId, JobGroup};

enum Task {
    Plain(Box<dyn FnOnce() + Send + 'static>),
    Grouped { group: Arc<JobGroup>, item: WorkItem },
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Task>,
    /// Items submitted and not yet finished (queued + running).
    open: usize,
    shutdown: bool,
    /// Live groups, so a cancel can fail the ones that are mid-flight.
    groups: HashMap<GroupId, Arc<JobGroup>>,
}

pub(crate) struct PoolShared {
    state: Mutex<PoolState>,
    work_available: Condvar,
    drained: Condvar,
    next_group: AtomicU64,
}

impl PoolShared {
    pub(crate) fn forget_group(&self, id: GroupId) {
        self.state.lock().groups.remove(&id);
    }

    fn finish_open(&self, count: usize) {
        let mut state = self.state.lock();
        state.open -= count;
        if state.open == 0 {
            self.drained.notify_all();
        }
    }
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.workers.len())
            .field("open", &self.open_items())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `threads` workers; `0` means one per available CPU.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = if threads == 0 {
            default_thread_count()
        } else {
            threads
        };

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState::default()),
            work_available: Condvar::new(),
            drained: Condvar::new(),
            next_group: AtomicU64::new(1),
        });

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("nodeforge-worker-{i}"))
                .spawn(move || worker_loop(shared))?;
            workers.push(handle);
        }

        info!(threads, "worker pool started");
        Ok(Self { shared, workers })
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Items queued or running right now.
    pub fn open_items(&self) -> usize {
        self.shared.state.lock().open
    }

    /// Queue a single item at the back of the queue.
    pub fn submit<F>(&self, item: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        state.queue.push_back(Task::Plain(Box::new(item)));
        state.open += 1;
        self.shared.work_available.notify_one();
    }

    /// Queue every item of `job` as one group.
    ///
    /// A job without items resolves (as completed) before this returns.
    pub fn submit_group(&self, label: impl Into<String>, job: BuildJob) -> GroupHandle {
        let id = GroupId(self.shared.next_group.fetch_add(1, Ordering::Relaxed));
        let (group, items, handle) =
            JobGroup::from_job(id, label.into(), job, Arc::downgrade(&self.shared));
        let group = Arc::new(group);

        if items.is_empty() {
            debug!(group = %id, label = %group.label(), "empty job group; resolving immediately");
            group.resolve();
            return handle;
        }

        let count = items.len();
        {
            let mut state = self.shared.state.lock();
            state.groups.insert(id, Arc::clone(&group));
            for item in items {
                state.queue.push_back(Task::Grouped {
                    group: Arc::clone(&group),
                    item,
                });
            }
            state.open += count;
        }
        self.shared.work_available.notify_all();

        debug!(group = %id, label = %group.label(), items = count, "submitted job group");
        handle
    }

    /// Drop every queued item without running it, fail every live group,
    /// then wait for the items that were already running.
    pub fn cancel_current_tasks(&self) {
        let (drained, live): (Vec<Task>, Vec<Arc<JobGroup>>) = {
            let mut state = self.shared.state.lock();
            let drained = state.queue.drain(..).collect();
            let live = state.groups.values().cloned().collect();
            (drained, live)
        };

        info!(
            discarded = drained.len(),
            groups = live.len(),
            "cancelling current worker pool tasks"
        );

        for group in &live {
            group.mark_failed();
        }

        let discarded = drained.len();
        for task in drained {
            if let Task::Grouped { group, item } = task {
                drop(item);
                group.finish_item();
            }
        }
        if discarded > 0 {
            self.shared.finish_open(discarded);
        }

        self.wait_for_current_tasks();
    }

    /// Block until every submitted item has finished or been discarded.
    pub fn wait_for_current_tasks(&self) {
        let mut state = self.shared.state.lock();
        while state.open > 0 {
            self.shared.drained.wait(&mut state);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel_current_tasks();
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
        }
        self.shared.work_available.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
        debug!("worker pool stopped");
    }
}

fn default_thread_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if let Some(task) = state.queue.pop_front() {
                    break task;
                }
                if state.shutdown {
                    return;
                }
                shared.work_available.wait(&mut state);
            }
        };

        let _open = OpenItem(&shared);
        run_task(task);
    }
}

/// Accounts for one dequeued item when dropped, even if running it unwound.
struct OpenItem<'a>(&'a PoolShared);

impl Drop for OpenItem<'_> {
    fn drop(&mut self) {
        self.0.finish_open(1);
    }
}

fn run_task(task: Task) {
    match task {
        Task::Plain(f) => {
            if catch_unwind(AssertUnwindSafe(f)).is_err() {
                warn!("work item panicked");
            }
        }
        Task::Grouped { group, item } => {
            if group.is_failed() {
                trace!(group = %group.id(), "skipping item of failed group");
            } else {
                match catch_unwind(AssertUnwindSafe(item)) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(group = %group.id(), label = %group.label(), error = %err, "work item failed");
                        group.mark_failed();
                    }
                    Err(_) => {
                        warn!(group = %group.id(), label = %group.label(), "work item panicked");
                        group.mark_failed();
                    }
                }
            }
            group.finish_item();
        }
    }
}
