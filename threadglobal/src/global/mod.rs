//! Per-thread named values.
//!
//! This module provides:
//! - A copy-on-write registry owned by each thread
//! - Typed handles for reading and writing named values
//! - Snapshots for carrying values to other threads
//! - Scope guards for clearing or restoring a thread's values

mod cell;
mod handle;
mod registry;
mod scope;
mod snapshot;

pub use cell::Cell;
pub use handle::ThreadGlobal;
pub use registry::Registry;
pub use scope::{with_root, GlobalScope, RestoreGuard};
pub use snapshot::{dump_values, Snapshot};

use registry::publish;
use serde_json::Value;

/// Returns true if `name` is bound on the calling thread.
#[must_use]
pub fn contains(name: &str) -> bool {
    Registry::current().contains(name)
}

/// Returns the number of distinct names set on the calling thread since its
/// last [`clear`].
#[must_use]
pub fn size() -> usize {
    Registry::current().len()
}

/// Returns the names bound on the calling thread.
#[must_use]
pub fn names() -> Vec<String> {
    Registry::current().names()
}

/// Replaces the calling thread's registry with an empty one.
///
/// Other threads, including children already spawned from this one, keep
/// their own registries.
pub fn clear() {
    publish(|_| Registry::empty());
}

/// Binds a raw JSON value on the calling thread.
pub fn set_value(name: impl Into<String>, value: Value) {
    let cell = Cell::new(name, value);
    publish(|current| current.with_cell(cell));
}

/// Returns the raw JSON value bound on the calling thread.
#[must_use]
pub fn get_value(name: &str) -> Option<Value> {
    Registry::current().get(name).map(|cell| cell.value().clone())
}

/// Unbinds `name` on the calling thread. Returns true if it was bound.
pub fn remove(name: &str) -> bool {
    let was_set = contains(name);
    if was_set {
        publish(|current| current.without(name));
    }
    was_set
}

/// Runs `f` with `name` temporarily bound to `value`.
///
/// The calling thread's registry is restored when `f` returns or unwinds, so
/// other writes made by `f` are undone as well.
pub fn with_value<F, R>(name: impl Into<String>, value: Value, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _restore = RestoreGuard::capture();
    set_value(name, value);
    f()
}
