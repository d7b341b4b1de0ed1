// src/exec/job_group.rs

//! Completion tracking for one submitted [`BuildJob`].
//!
//! A group starts with `remaining = K` (the job's item count). Each item,
//! whether it ran, failed or was discarded by a cancel, decrements the
//! counter exactly once; whoever takes it to zero resolves the group and
//! fires either the completion or the failure callback, then cleanup.
//! A callback that panics is caught there and cannot strand the group.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::exec::build_job::{BuildJob, JobCallback};
use crate::exec::worker_pool::PoolShared;

/// Pool-unique identifier of a job group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a group ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOutcome {
    Completed,
    Failed,
}

struct GroupCallbacks {
    on_complete: Option<JobCallback>,
    on_failure: Option<JobCallback>,
    on_cleanup: Option<JobCallback>,
}

pub struct JobGroup {
    id: GroupId,
    label: String,
    remaining: AtomicUsize,
    failed: AtomicBool,
    callbacks: Mutex<Option<GroupCallbacks>>,
    waiter: Mutex<Option<oneshot::Sender<GroupOutcome>>>,
    pool: Weak<PoolShared>,
}

impl fmt::Debug for JobGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobGroup")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("remaining", &self.remaining())
            .field("failed", &self.is_failed())
            .finish_non_exhaustive()
    }
}

impl JobGroup {
    /// Split a job into its group and its work items.
    pub(crate) fn from_job(
        id: GroupId,
        label: String,
        job: BuildJob,
        pool: Weak<PoolShared>,
    ) -> (Self, Vec<crate::exec::build_job::WorkItem>, GroupHandle) {
        let BuildJob {
            items,
            on_complete,
            on_failure,
            on_cleanup,
        } = job;

        let (tx, rx) = oneshot::channel();
        let group = Self {
            id,
            label,
            remaining: AtomicUsize::new(items.len()),
            failed: AtomicBool::new(false),
            callbacks: Mutex::new(Some(GroupCallbacks {
                on_complete,
                on_failure,
                on_cleanup,
            })),
            waiter: Mutex::new(Some(tx)),
            pool,
        };

        (group, items, GroupHandle { id, outcome: rx })
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Items not yet accounted for.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Make the group resolve through its failure path.
    ///
    /// Items that have not started yet are skipped from now on.
    pub(crate) fn mark_failed(&self) {
        if !self.failed.swap(true, Ordering::AcqRel) {
            debug!(group = %self.id, label = %self.label, "job group marked failed");
        }
    }

    /// Account for one item (run, failed or discarded).
    ///
    /// Returns `true` if this call resolved the group.
    pub(crate) fn finish_item(&self) -> bool {
        let before = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(before > 0, "job group {} over-finished", self.id);
        if before == 1 {
            self.resolve();
            true
        } else {
            false
        }
    }

    /// Fire complete or failure, then cleanup, then wake the waiter and drop
    /// out of the pool's group table.
    ///
    /// Callback panics are contained. A completion callback that panics
    /// turns the group into a failed one, and the failure callback runs.
    pub(crate) fn resolve(&self) {
        let Some(callbacks) = self.callbacks.lock().take() else {
            return;
        };

        let mut outcome = if self.is_failed() {
            GroupOutcome::Failed
        } else {
            GroupOutcome::Completed
        };
        trace!(group = %self.id, label = %self.label, ?outcome, "resolving job group");

        if outcome == GroupOutcome::Completed
            && !self.run_callback("on_complete", callbacks.on_complete)
        {
            // A completion that panicked did not publish; fail the group.
            self.mark_failed();
            outcome = GroupOutcome::Failed;
        }
        if outcome == GroupOutcome::Failed {
            self.run_callback("on_failure", callbacks.on_failure);
        }
        self.run_callback("on_cleanup", callbacks.on_cleanup);

        if let Some(tx) = self.waiter.lock().take() {
            // The handle may have been dropped; nobody is waiting then.
            let _ = tx.send(outcome);
        }

        if let Some(pool) = self.pool.upgrade() {
            pool.forget_group(self.id);
        }
    }
}

impl JobGroup {
    /// Run one group callback, containing a panic. Returns `false` if it
    /// panicked.
    fn run_callback(&self, which: &str, callback: Option<JobCallback>) -> bool {
        let Some(callback) = callback else {
            return true;
        };
        match catch_unwind(AssertUnwindSafe(callback)) {
            Ok(()) => true,
            Err(_) => {
                warn!(group = %self.id, label = %self.label, callback = which, "job group callback panicked");
                false
            }
        }
    }
}

/// Handle returned from `WorkerPool::submit_group` for synchronous waiters.
#[derive(Debug)]
pub struct GroupHandle {
    id: GroupId,
    outcome: oneshot::Receiver<GroupOutcome>,
}

impl GroupHandle {
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Block the calling (non-async) thread until the group resolves.
    ///
    /// # Panics
    ///
    /// When called from within an asynchronous execution context (a tokio
    /// runtime thread). Use [`Self::outcome`] there.
    pub fn wait(self) -> GroupOutcome {
        self.outcome.blocking_recv().unwrap_or(GroupOutcome::Failed)
    }

    /// Wait for the group to resolve without blocking the runtime.
    pub async fn outcome(self) -> GroupOutcome {
        self.outcome.await.unwrap_or(GroupOutcome::Failed)
    }
}
