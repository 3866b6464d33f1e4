//! Executors and the globals-propagating executor wrapper.
//!
//! This module provides:
//! - Executor / ExecutorService traits over any job runner
//! - WorkerPool, a configurable thread pool
//! - TaskHandle for value-returning submissions
//! - PropagatingExecutor, which snapshots globals at submission time

mod handle;
mod pool;
mod propagating;
mod tokio_blocking;

pub use handle::TaskHandle;
pub use pool::WorkerPool;
pub use propagating::PropagatingExecutor;
pub use tokio_blocking::TokioBlockingExecutor;

use crate::errors::RejectedError;
use std::sync::Arc;
use std::time::Duration;

/// A boxed fire-and-forget unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Anything that can run jobs, now or later, on some thread.
pub trait Executor: Send + Sync {
    /// Hands `job` to the executor.
    ///
    /// # Errors
    ///
    /// Returns `RejectedError` if the executor refuses the job. The job has
    /// been dropped in that case.
    fn execute(&self, job: Job) -> Result<(), RejectedError>;
}

/// An executor with a managed lifecycle.
pub trait ExecutorService: Executor {
    /// Stops accepting jobs. Queued jobs still run.
    fn shutdown(&self);

    /// Stops accepting jobs and drops queued ones. Returns how many were
    /// dropped. Running jobs are not interrupted.
    fn shutdown_now(&self) -> usize;

    /// Returns true once shutdown has been requested.
    fn is_shutdown(&self) -> bool;

    /// Returns true once shutdown has been requested and every job is done.
    fn is_terminated(&self) -> bool;

    /// Blocks until terminated or until `timeout` elapses. Returns whether
    /// the executor terminated.
    fn await_termination(&self, timeout: Duration) -> bool;
}

/// Closure-friendly helpers for every [`Executor`].
pub trait ExecutorExt: Executor {
    /// Runs `f` without collecting a result.
    ///
    /// # Errors
    ///
    /// Returns `RejectedError` if the executor refuses the job.
    fn spawn<F>(&self, f: F) -> Result<(), RejectedError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(Box::new(f))
    }

    /// Runs `f` and returns a handle to its result.
    ///
    /// # Errors
    ///
    /// Returns `RejectedError` if the executor refuses the job.
    fn submit<F, R>(&self, f: F) -> Result<TaskHandle<R>, RejectedError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (completer, handle) = handle::task_pair();
        self.execute(Box::new(move || completer.complete_with(f)))?;
        Ok(handle)
    }
}

impl<E: Executor + ?Sized> ExecutorExt for E {}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        (**self).execute(job)
    }
}

impl<E: ExecutorService + ?Sized> ExecutorService for Arc<E> {
    fn shutdown(&self) {
        (**self).shutdown();
    }

    fn shutdown_now(&self) -> usize {
        (**self).shutdown_now()
    }

    fn is_shutdown(&self) -> bool {
        (**self).is_shutdown()
    }

    fn is_terminated(&self) -> bool {
        (**self).is_terminated()
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        (**self).await_termination(timeout)
    }
}
