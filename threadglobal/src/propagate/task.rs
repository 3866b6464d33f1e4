//! Synchronous task decoration.

use crate::global::{dump_values, RestoreGuard, Snapshot};

/// What happens to the executing thread's globals after a wrapped task runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayMode {
    /// Replayed values stay bound on the executing thread. A reused pool
    /// worker ends up holding the union of every snapshot replayed on it
    /// (later snapshots overwrite earlier ones name by name).
    #[default]
    Accumulate,
    /// The executing thread's previous registry is reinstalled once the task
    /// returns or unwinds.
    Restore,
}

/// A unit of work that replays a [`Snapshot`] before running.
///
/// The delegate's return value, including any `Result`, is handed back
/// unchanged, and a panic in the delegate unwinds through the wrapper. The
/// wrapper has no failure mode of its own.
#[derive(Debug)]
#[must_use = "a wrapped task does nothing until run"]
pub struct PropagatingTask<F> {
    task: F,
    snapshot: Snapshot,
    mode: ReplayMode,
}

impl<F> PropagatingTask<F> {
    /// Wraps `task` with `snapshot` in [`ReplayMode::Accumulate`].
    pub fn new(task: F, snapshot: Snapshot) -> Self {
        Self {
            task,
            snapshot,
            mode: ReplayMode::Accumulate,
        }
    }

    /// Sets the replay mode.
    pub fn with_mode(mut self, mode: ReplayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Switches to [`ReplayMode::Restore`].
    pub fn restoring(self) -> Self {
        self.with_mode(ReplayMode::Restore)
    }

    /// Returns the snapshot that will be replayed.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Returns the replay mode.
    #[must_use]
    pub fn mode(&self) -> ReplayMode {
        self.mode
    }

    /// Replays the snapshot on the calling thread and runs the delegate.
    pub fn run<R>(self) -> R
    where
        F: FnOnce() -> R,
    {
        let _restore = match self.mode {
            ReplayMode::Accumulate => None,
            ReplayMode::Restore => Some(RestoreGuard::capture()),
        };
        self.snapshot.replay();
        (self.task)()
    }

    /// Converts into a plain closure, for APIs that take `FnOnce`.
    pub fn into_fn<R>(self) -> impl FnOnce() -> R
    where
        F: FnOnce() -> R,
    {
        move || self.run()
    }
}

/// Wraps `task` so that it replays `snapshot` on whichever thread runs it.
pub fn wrap<F>(task: F, snapshot: Snapshot) -> PropagatingTask<F> {
    PropagatingTask::new(task, snapshot)
}

/// Wraps `task` with a snapshot of the calling thread's globals, taken now.
pub fn wrap_current<F>(task: F) -> PropagatingTask<F> {
    PropagatingTask::new(task, dump_values())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::{clear, contains, get_value, set_value, size};
    use serde_json::json;
    use std::collections::HashMap;

    fn snapshot_of(pairs: &[(&str, serde_json::Value)]) -> Snapshot {
        Snapshot::from_values(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_replays_before_delegate() {
        clear();
        let task = wrap(|| get_value("trace_id"), snapshot_of(&[("trace_id", json!("t-1"))]));

        assert_eq!(task.run(), Some(json!("t-1")));
    }

    #[test]
    fn test_accumulate_keeps_values_after_run() {
        clear();
        set_value("local", json!("mine"));

        wrap(|| (), snapshot_of(&[("replayed", json!(1))])).run();

        assert!(contains("local"));
        assert_eq!(get_value("replayed"), Some(json!(1)));
    }

    #[test]
    fn test_restore_reinstalls_previous_registry() {
        clear();
        set_value("local", json!("mine"));

        let seen = wrap(
            || {
                set_value("written_inside", json!(true));
                get_value("local")
            },
            snapshot_of(&[("local", json!("theirs"))]),
        )
        .restoring()
        .run();

        assert_eq!(seen, Some(json!("theirs")));
        assert_eq!(get_value("local"), Some(json!("mine")));
        assert!(!contains("written_inside"));
    }

    #[test]
    fn test_restore_on_panic() {
        clear();
        set_value("local", json!(0));

        let result = std::panic::catch_unwind(|| {
            wrap(|| panic!("delegate failed"), snapshot_of(&[("x", json!(1))]))
                .restoring()
                .run::<()>();
        });

        assert!(result.is_err());
        assert_eq!(size(), 1);
        assert!(!contains("x"));
    }

    #[test]
    fn test_delegate_result_passes_through() {
        let ok: Result<u8, String> = wrap(|| Ok(5), Snapshot::empty()).run();
        let err: Result<u8, String> = wrap(|| Err("nope".to_string()), Snapshot::empty()).run();

        assert_eq!(ok, Ok(5));
        assert_eq!(err, Err("nope".to_string()));
    }

    #[test]
    fn test_wrap_current_captures_at_wrap_time() {
        clear();
        set_value("k", json!("at-wrap"));
        let task = wrap_current(|| get_value("k"));
        set_value("k", json!("later"));

        let seen = std::thread::spawn(move || task.run()).join().unwrap();
        assert_eq!(seen, Some(json!("at-wrap")));
    }

    #[test]
    fn test_into_fn() {
        clear();
        let f = wrap(|| get_value("k"), snapshot_of(&[("k", json!(2))])).into_fn();
        let seen = std::thread::spawn(f).join().unwrap();
        assert_eq!(seen, Some(json!(2)));
    }

    #[test]
    fn test_default_mode_is_accumulate() {
        let task = wrap(|| (), Snapshot::empty());
        assert_eq!(task.mode(), ReplayMode::Accumulate);
        assert!(task.snapshot().is_empty());
    }
}
