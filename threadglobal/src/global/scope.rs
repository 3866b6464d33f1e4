//! Guards that bound the lifetime of ambient values.
//!
//! Nothing in this crate cleans up a thread's globals on its own; these
//! guards are the explicit way to do it at the edge of a unit of work.

use super::registry::Registry;
use super::Snapshot;
use tracing::debug;

/// Clears the calling thread's globals when dropped.
///
/// Meant for the outermost frame of framework code, such as a request
/// handler. Everything bound on the thread is dropped, including values set
/// by code further down the stack.
#[derive(Debug)]
#[must_use = "the globals are cleared when the guard is dropped"]
pub struct GlobalScope {
    _private: (),
}

impl GlobalScope {
    /// Opens a scope on the calling thread.
    pub fn enter() -> Self {
        Self { _private: () }
    }
}

impl Drop for GlobalScope {
    fn drop(&mut self) {
        if Registry::empty().try_install().is_some() {
            debug!("Global scope closed, thread globals cleared");
        }
    }
}

/// Reinstalls the registry that was current when the guard was created.
///
/// Unlike [`GlobalScope`], bindings that existed before the guard survive;
/// only changes made while it was alive are undone.
#[derive(Debug)]
#[must_use = "the previous globals are restored when the guard is dropped"]
pub struct RestoreGuard {
    saved: Option<Registry>,
}

impl RestoreGuard {
    /// Remembers the calling thread's registry.
    pub fn capture() -> Self {
        Self {
            saved: Some(Registry::current()),
        }
    }

    /// Drops the guard without restoring anything.
    pub fn forget(mut self) {
        self.saved = None;
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            let _ = saved.try_install();
        }
    }
}

/// Runs `f` with `root` bound as the thread's ambient state, then clears.
///
/// This is the attach-on-entry, release-on-exit pattern used around an
/// inbound request. The thread is cleared even if `f` unwinds.
pub fn with_root<F, R>(root: &Snapshot, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _scope = GlobalScope::enter();
    Registry::empty().install();
    root.replay();
    f()
}
