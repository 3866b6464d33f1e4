//! Carrying globals through async tasks.
//!
//! A future on a multi-threaded runtime may be polled by a different worker
//! each time it wakes, so replaying once is not enough. A
//! [`PropagatingFuture`] owns its own registry and installs it on the polling
//! thread for the duration of every `poll`, putting the worker's registry
//! back afterwards. Writes made inside the future persist across its polls
//! and never leak onto the workers.

use crate::global::{Registry, Snapshot};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that runs with its own set of globals.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct PropagatingFuture<F> {
    future: Pin<Box<F>>,
    registry: Option<Registry>,
}

impl<F: Future> PropagatingFuture<F> {
    /// Wraps `future` with globals seeded from `snapshot`.
    pub fn new(future: F, snapshot: &Snapshot) -> Self {
        Self::with_registry(future, Registry::empty().with_values(snapshot.iter()))
    }

    /// Wraps `future` with an explicit registry.
    pub fn with_registry(future: F, registry: Registry) -> Self {
        Self {
            future: Box::pin(future),
            registry: Some(registry),
        }
    }

    /// Wraps `future` with a fork of the calling thread's globals.
    pub fn inherit(future: F) -> Self {
        Self::with_registry(future, Registry::current().fork())
    }
}

struct PollGuard<'a> {
    slot: &'a mut Option<Registry>,
    previous: Option<Registry>,
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.slot = previous.try_install();
        }
    }
}

impl<F: Future> Future for PropagatingFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Self { future, registry } = self.get_mut();
        let own = registry.take().unwrap_or_default();
        let _guard = PollGuard {
            previous: Some(own.install()),
            slot: registry,
        };
        future.as_mut().poll(cx)
    }
}

/// Extension methods for attaching globals to futures.
pub trait GlobalsFutureExt: Future + Sized {
    /// Runs this future with a fork of the calling thread's globals.
    fn with_current_globals(self) -> PropagatingFuture<Self> {
        PropagatingFuture::inherit(self)
    }

    /// Runs this future with globals seeded from `snapshot`.
    fn with_snapshot(self, snapshot: &Snapshot) -> PropagatingFuture<Self> {
        PropagatingFuture::new(self, snapshot)
    }
}

impl<F: Future> GlobalsFutureExt for F {}

/// Spawns `future` on the current tokio runtime with a fork of the calling
/// thread's globals.
///
/// # Panics
///
/// Panics when called outside a tokio runtime, like [`tokio::spawn`].
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(PropagatingFuture::inherit(future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::{clear, contains, dump_values, get_value, set_value};
    use serde_json::json;

    /// Returns `Pending` once, waking itself, then completes.
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    #[test]
    fn test_future_sees_snapshot_values() {
        clear();
        set_value("request_id", json!("r-1"));
        let snapshot = dump_values();
        clear();

        let seen = futures::executor::block_on(
            async { get_value("request_id") }.with_snapshot(&snapshot),
        );

        assert_eq!(seen, Some(json!("r-1")));
        assert!(!contains("request_id"));
    }

    #[test]
    fn test_writes_inside_future_stay_inside() {
        clear();
        set_value("outer", json!(1));

        let seen = futures::executor::block_on(
            async {
                set_value("inner", json!(2));
                YieldOnce(false).await;
                (get_value("outer"), get_value("inner"))
            }
            .with_current_globals(),
        );

        assert_eq!(seen, (Some(json!(1)), Some(json!(2))));
        assert!(!contains("inner"));
        assert_eq!(get_value("outer"), Some(json!(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawn_carries_globals_across_workers() {
        clear();
        set_value("trace_id", json!("abc"));

        let handle = spawn(async {
            let before = get_value("trace_id");
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            (before, get_value("trace_id"))
        });
        set_value("trace_id", json!("changed"));

        let (before, after) = handle.await.unwrap();
        assert_eq!(before, Some(json!("abc")));
        assert_eq!(after, Some(json!("abc")));
    }

    #[tokio::test]
    async fn test_unwrapped_spawn_does_not_see_globals() {
        clear();
        set_value("trace_id", json!("abc"));

        let seen = tokio::task::spawn_blocking(|| get_value("trace_id")).await.unwrap();
        assert_eq!(seen, None);
    }
}
