//! Spawning threads that inherit the parent's globals.
//!
//! Rust threads start with fresh thread-locals, so inheritance is explicit:
//! these functions fork the calling thread's registry at spawn time and
//! install the fork on the new thread before the closure runs. Writes made
//! afterwards on either side stay on that side.

use crate::global::Registry;
use std::io;
use std::thread::{JoinHandle, Scope, ScopedJoinHandle};
use tracing::debug;

/// Spawns a thread that starts with a copy of the caller's globals.
///
/// # Panics
///
/// Panics if the OS fails to create a thread, like [`std::thread::spawn`].
/// Use [`Builder::spawn`] to handle that case.
pub fn spawn<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let inherited = Registry::current().fork();
    std::thread::spawn(move || run_inherited(inherited, f))
}

/// Spawns a scoped thread that starts with a copy of the caller's globals.
pub fn scope_spawn<'scope, 'env, F, R>(
    scope: &'scope Scope<'scope, 'env>,
    f: F,
) -> ScopedJoinHandle<'scope, R>
where
    F: FnOnce() -> R + Send + 'scope,
    R: Send + 'scope,
{
    let inherited = Registry::current().fork();
    scope.spawn(move || run_inherited(inherited, f))
}

fn run_inherited<F, R>(inherited: Registry, f: F) -> R
where
    F: FnOnce() -> R,
{
    debug!(entries = inherited.len(), "Thread starting with inherited globals");
    inherited.install();
    f()
}

/// Thread factory mirroring [`std::thread::Builder`] with inheritance.
#[derive(Debug, Default)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the thread name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the stack size in bytes.
    #[must_use]
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Spawns the thread with a copy of the caller's globals.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn<F, R>(self, f: F) -> io::Result<JoinHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let inherited = Registry::current().fork();
        self.into_std().spawn(move || run_inherited(inherited, f))
    }

    /// Spawns the thread without inheriting anything.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn_detached<F, R>(self, f: F) -> io::Result<JoinHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.into_std().spawn(f)
    }

    fn into_std(self) -> std::thread::Builder {
        let mut builder = std::thread::Builder::new();
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        builder
    }
}
