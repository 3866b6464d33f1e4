//! Executor wrapper that carries globals from submitter to worker.

use super::{Executor, ExecutorService, Job, WorkerPool};
use crate::config::PoolConfig;
use crate::errors::{RejectedError, ThreadGlobalError};
use crate::global::dump_values;
use crate::propagate::{PropagatingTask, ReplayMode};
use std::time::Duration;
use tracing::trace;

/// Wraps an executor so every job sees the submitter's globals.
///
/// On each submission the submitting thread's globals are captured with
/// [`dump_values`] before the job is handed on, and the job is wrapped in a
/// [`PropagatingTask`] that replays them on the worker. Queueing, thread
/// reuse, rejection and shutdown are left entirely to the wrapped executor.
///
/// Pool workers are long-lived, so spawn-time inheritance cannot give them
/// the right values; capturing per submission does. A job sees exactly the
/// globals present at the moment it was submitted, never later writes.
///
/// ```rust
/// use threadglobal::prelude::*;
///
/// let pool = PropagatingExecutor::new(WorkerPool::fixed(2).unwrap());
///
/// set_value("request_id", serde_json::json!("req-7"));
/// let handle = pool.submit(|| get_value("request_id")).unwrap();
///
/// assert_eq!(handle.join().unwrap(), Some(serde_json::json!("req-7")));
/// ```
#[derive(Debug)]
pub struct PropagatingExecutor<E> {
    inner: E,
    mode: ReplayMode,
}

impl<E> PropagatingExecutor<E> {
    /// Wraps `inner` in [`ReplayMode::Accumulate`].
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            mode: ReplayMode::Accumulate,
        }
    }

    /// Sets how workers treat replayed globals after each job.
    #[must_use]
    pub fn with_mode(mut self, mode: ReplayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Restores each worker's own globals after every job.
    #[must_use]
    pub fn restoring(self) -> Self {
        self.with_mode(ReplayMode::Restore)
    }

    /// Returns the replay mode.
    #[must_use]
    pub fn mode(&self) -> ReplayMode {
        self.mode
    }

    /// Returns the wrapped executor.
    #[must_use]
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Unwraps the executor.
    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl PropagatingExecutor<WorkerPool> {
    /// Builds a propagating [`WorkerPool`] from `config`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid.
    pub fn with_config(config: PoolConfig) -> Result<Self, ThreadGlobalError> {
        WorkerPool::new(config).map(Self::new)
    }

    /// Builds a propagating pool of exactly `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `threads` is zero.
    pub fn fixed(threads: usize) -> Result<Self, ThreadGlobalError> {
        Self::with_config(PoolConfig::fixed(threads))
    }
}

impl<E: Executor> Executor for PropagatingExecutor<E> {
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        let snapshot = dump_values();
        trace!(snapshot_id = %snapshot.id(), "Wrapping job with submitter globals");
        let task = PropagatingTask::new(job, snapshot).with_mode(self.mode);
        self.inner.execute(Box::new(move || task.run()))
    }
}

impl<E: ExecutorService> ExecutorService for PropagatingExecutor<E> {
    fn shutdown(&self) {
        self.inner.shutdown();
    }

    fn shutdown_now(&self) -> usize {
        self.inner.shutdown_now()
    }

    fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        self.inner.await_termination(timeout)
    }
}
