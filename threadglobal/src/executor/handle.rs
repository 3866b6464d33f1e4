//! Result handles for value-returning tasks.

use crate::errors::TaskError;
use futures::task::AtomicWaker;
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

enum Outcome<R> {
    Pending,
    Done(Result<R, TaskError>),
    Taken,
}

struct Shared<R> {
    outcome: Mutex<Outcome<R>>,
    done: Condvar,
    waker: AtomicWaker,
}

/// Creates a connected completer/handle pair.
pub(crate) fn task_pair<R>() -> (Completer<R>, TaskHandle<R>) {
    let shared = Arc::new(Shared {
        outcome: Mutex::new(Outcome::Pending),
        done: Condvar::new(),
        waker: AtomicWaker::new(),
    });
    (
        Completer {
            shared: Some(shared.clone()),
        },
        TaskHandle { shared },
    )
}

/// The producing side of a [`TaskHandle`].
///
/// Dropping a completer that never ran resolves the handle with
/// [`TaskError::Cancelled`], which is how jobs discarded by a pool surface to
/// their submitter.
pub(crate) struct Completer<R> {
    shared: Option<Arc<Shared<R>>>,
}

impl<R> Completer<R> {
    /// Runs `f` and resolves the handle with its value or its panic.
    pub(crate) fn complete_with<F>(mut self, f: F)
    where
        F: FnOnce() -> R,
    {
        let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(|payload| TaskError::from_panic(payload.as_ref()));
        self.finish(outcome);
    }

    fn finish(&mut self, result: Result<R, TaskError>) {
        if let Some(shared) = self.shared.take() {
            *shared.outcome.lock() = Outcome::Done(result);
            shared.done.notify_all();
            shared.waker.wake();
        }
    }
}

impl<R> Drop for Completer<R> {
    fn drop(&mut self) {
        self.finish(Err(TaskError::Cancelled));
    }
}

/// Handle to the eventual result of a submitted task.
///
/// Block on it with [`join`](Self::join) or `.await` it from async code.
/// Dropping the handle does not cancel the task.
#[must_use = "dropping a TaskHandle discards the task's result"]
pub struct TaskHandle<R> {
    shared: Arc<Shared<R>>,
}

impl<R> TaskHandle<R> {
    /// Blocks until the task finishes.
    ///
    /// # Errors
    ///
    /// Returns `Panicked` if the task panicked and `Cancelled` if it was
    /// dropped without running.
    pub fn join(self) -> Result<R, TaskError> {
        let mut outcome = self.shared.outcome.lock();
        while matches!(*outcome, Outcome::Pending) {
            self.shared.done.wait(&mut outcome);
        }
        take(&mut outcome)
    }

    /// Blocks until the task finishes or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// As [`join`](Self::join), plus `TimedOut` when the deadline passes
    /// first. The task itself keeps running.
    pub fn join_timeout(self, timeout: Duration) -> Result<R, TaskError> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.shared.outcome.lock();
        while matches!(*outcome, Outcome::Pending) {
            if self.shared.done.wait_until(&mut outcome, deadline).timed_out()
                && matches!(*outcome, Outcome::Pending)
            {
                return Err(TaskError::TimedOut);
            }
        }
        take(&mut outcome)
    }

    /// Returns true once the task has finished, panicked or been dropped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(*self.shared.outcome.lock(), Outcome::Pending)
    }
}

fn take<R>(outcome: &mut Outcome<R>) -> Result<R, TaskError> {
    match std::mem::replace(outcome, Outcome::Taken) {
        Outcome::Done(result) => result,
        Outcome::Pending | Outcome::Taken => Err(TaskError::Cancelled),
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.shared.waker.register(cx.waker());
        let mut outcome = self.shared.outcome.lock();
        if matches!(*outcome, Outcome::Pending) {
            Poll::Pending
        } else {
            Poll::Ready(take(&mut outcome))
        }
    }
}

impl<R> std::fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_value() {
        let (completer, handle) = task_pair();
        std::thread::spawn(move || completer.complete_with(|| 40 + 2));
        assert_eq!(handle.join(), Ok(42));
    }

    #[test]
    fn test_join_panic() {
        let (completer, handle) = task_pair::<()>();
        completer.complete_with(|| panic!("task exploded"));
        assert_eq!(
            handle.join(),
            Err(TaskError::Panicked("task exploded".to_string()))
        );
    }

    #[test]
    fn test_dropped_completer_cancels() {
        let (completer, handle) = task_pair::<u8>();
        assert!(!handle.is_finished());
        drop(completer);
        assert!(handle.is_finished());
        assert_eq!(handle.join(), Err(TaskError::Cancelled));
    }

    #[test]
    fn test_join_timeout_elapses() {
        let (_completer, handle) = task_pair::<u8>();
        assert_eq!(
            handle.join_timeout(Duration::from_millis(20)),
            Err(TaskError::TimedOut)
        );
    }

    #[test]
    fn test_join_timeout_completes() {
        let (completer, handle) = task_pair();
        completer.complete_with(|| "ready");
        assert_eq!(handle.join_timeout(Duration::from_secs(1)), Ok("ready"));
    }

    #[test]
    fn test_await_handle() {
        let (completer, handle) = task_pair();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            completer.complete_with(|| "async".to_string());
        });
        assert_eq!(tokio_test::block_on(handle), Ok("async".to_string()));
    }

    #[test]
    fn test_await_already_done() {
        let (completer, handle) = task_pair();
        completer.complete_with(|| 1);
        let mut handle = tokio_test::task::spawn(handle);
        tokio_test::assert_ready_eq!(handle.poll(), Ok(1));
    }
}
