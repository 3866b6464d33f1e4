//! Executor adapter over tokio's blocking thread pool.

use super::{Executor, Job};
use crate::errors::RejectedError;
use tokio::runtime::Handle;

/// Runs jobs with [`Handle::spawn_blocking`].
///
/// Useful for handing synchronous work to a tokio runtime while still going
/// through [`PropagatingExecutor`](super::PropagatingExecutor). Tokio's
/// blocking threads are reused across jobs exactly like pool workers, so
/// they never inherit globals on their own.
#[derive(Debug, Clone)]
pub struct TokioBlockingExecutor {
    handle: Handle,
}

impl TokioBlockingExecutor {
    /// Wraps a runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Returns the runtime handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Executor for TokioBlockingExecutor {
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        // The JoinHandle is detached; results travel through TaskHandle.
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorExt, PropagatingExecutor};
    use crate::global::{clear, get_value, set_value};
    use serde_json::json;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_runs_on_blocking_pool() {
        let executor = TokioBlockingExecutor::current();
        let handle = executor
            .submit(|| std::thread::current().name().map(str::to_string))
            .unwrap();

        let name = handle.await.unwrap();
        assert!(name.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_jobs_see_submitter_globals() {
        let executor = PropagatingExecutor::new(TokioBlockingExecutor::current());

        clear();
        set_value("tenant", json!("acme"));
        let seen = executor.submit(|| get_value("tenant")).unwrap().await;
        clear();

        assert_eq!(seen, Ok(Some(json!("acme"))));
    }

    #[test]
    fn test_explicit_runtime_handle() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let executor = TokioBlockingExecutor::new(runtime.handle().clone());

        let handle = executor.submit(|| 6 * 7).unwrap();
        assert_eq!(handle.join(), Ok(42));
    }
}
