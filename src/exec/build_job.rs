// src/exec/build_job.rs

//! A node's computation, split into independently executable work items.

use std::fmt;

use crate::errors::BuildError;

/// One slice of a node's computation (e.g. one band of image rows).
pub type WorkItem = Box<dyn FnOnce() -> Result<(), BuildError> + Send + 'static>;

/// A callback fired once at the end of a job's life.
pub type JobCallback = Box<dyn FnOnce() + Send + 'static>;

/// What a node implementation hands to the scheduler when it becomes an
/// unbuilt root.
///
/// - `items` run on the worker pool in any order, possibly in parallel.
/// - `on_complete` runs once, after every item succeeded.
/// - `on_failure` runs instead if an item failed or the build was cancelled.
/// - `on_cleanup` always runs exactly once, after whichever of the above.
#[derive(Default)]
pub struct BuildJob {
    pub(crate) items: Vec<WorkItem>,
    pub(crate) on_complete: Option<JobCallback>,
    pub(crate) on_failure: Option<JobCallback>,
    pub(crate) on_cleanup: Option<JobCallback>,
}

impl BuildJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item<F>(mut self, item: F) -> Self
    where
        F: FnOnce() -> Result<(), BuildError> + Send + 'static,
    {
        self.items.push(Box::new(item));
        self
    }

    pub fn push_item<F>(&mut self, item: F)
    where
        F: FnOnce() -> Result<(), BuildError> + Send + 'static,
    {
        self.items.push(Box::new(item));
    }

    pub fn on_complete<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_failure<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    pub fn on_cleanup<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.on_cleanup = Some(Box::new(f));
        self
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl fmt::Debug for BuildJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildJob")
            .field("items", &self.items.len())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_cleanup", &self.on_cleanup.is_some())
            .finish()
    }
}

impl BuildJob {
    /// Run `f` after the job's own completion callback.
    pub(crate) fn then_complete<F: FnOnce() + Send + 'static>(&mut self, f: F) {
        let prev = self.on_complete.take();
        self.on_complete = Some(Box::new(move || {
            if let Some(prev) = prev {
                prev();
            }
            f();
        }));
    }

    /// Run `f` after the job's own failure callback.
    pub(crate) fn then_failure<F: FnOnce() + Send + 'static>(&mut self, f: F) {
        let prev = self.on_failure.take();
        self.on_failure = Some(Box::new(move || {
            if let Some(prev) = prev {
                prev();
            }
            f();
        }));
    }

    /// Replace every item with `wrap(item)`.
    pub(crate) fn wrap_items<W>(&mut self, mut wrap: W)
    where
        W: FnMut(WorkItem) -> WorkItem,
    {
        self.items = std::mem::take(&mut self.items)
            .into_iter()
            .map(&mut wrap)
            .collect();
    }
}
