// src/exec/mod.rs

//! Execution layer.
//!
//! This module runs node computations on a bounded set of worker threads and
//! reports back through job callbacks.
//!
//! - [`backend`] provides the `NodeImplementation` trait the scheduler calls
//!   into, plus the build context handed to it.
//! - [`build_job`] defines the per-node decomposition into work items.
//! - [`job_group`] tracks completion of one submitted job.
//! - [`worker_pool`] owns the worker threads and the shared FIFO queue.
//! - [`buffer`] holds the image buffers nodes produce.

pub mod backend;
pub mod buffer;
pub mod build_job;
pub mod job_group;
pub mod worker_pool;

pub use backend::{BuildContext, NodeImplementation, ResolvedDependencies};
pub use buffer::{ImageBuffer, OutputSlots};
pub use build_job::{BuildJob, JobCallback, WorkItem};
pub use job_group::{GroupHandle, GroupId, GroupOutcome, JobGroup};
pub use worker_pool::WorkerPool;
