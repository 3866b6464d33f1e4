//! # Threadglobal
//!
//! Named values that belong to a thread, follow it into the threads it
//! spawns, and can be carried into worker pools explicitly.
//!
//! Threadglobal provides:
//!
//! - **Thread-confined storage**: each thread owns a registry of named values
//! - **Copy-on-write inheritance**: spawned threads start with a cheap fork
//!   of their parent's values and diverge independently
//! - **Snapshots**: capture a thread's values and replay them anywhere
//! - **Pool propagation**: executors that snapshot at submission and replay
//!   on the worker, for threads and for futures
//!
//! ## Quick Start
//!
//! ```rust
//! use threadglobal::prelude::*;
//!
//! let user: ThreadGlobal<String> = ThreadGlobal::value("user");
//! user.set("ada".to_string()).unwrap();
//!
//! // Spawned threads inherit a copy.
//! let seen = threadglobal::thread::spawn(|| ThreadGlobal::<String>::value("user").get())
//!     .join()
//!     .unwrap();
//! assert_eq!(seen.as_deref(), Some("ada"));
//!
//! // Pools need the propagating wrapper.
//! let pool = PropagatingExecutor::fixed(2).unwrap();
//! let seen = pool.submit(|| get_value("user")).unwrap().join().unwrap();
//! assert_eq!(seen, Some(serde_json::json!("ada")));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod errors;
pub mod executor;
pub mod global;
pub mod observability;
pub mod propagate;
pub mod thread;

pub use config::{PoolConfig, QueueKind, RejectionPolicy};
pub use errors::{RejectReason, RejectedError, TaskError, ThreadGlobalError};
pub use global::{dump_values, Registry, Snapshot, ThreadGlobal};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{PoolConfig, QueueKind, RejectionPolicy};
    pub use crate::errors::{RejectReason, RejectedError, TaskError, ThreadGlobalError};
    pub use crate::executor::{
        Executor, ExecutorExt, ExecutorService, PropagatingExecutor, TaskHandle,
        TokioBlockingExecutor, WorkerPool,
    };
    pub use crate::global::{
        clear, contains, dump_values, get_value, set_value, size, with_root, with_value,
        GlobalScope, Registry, RestoreGuard, Snapshot, ThreadGlobal,
    };
    pub use crate::propagate::{
        wrap, wrap_current, GlobalsFutureExt, PropagatingFuture, PropagatingTask, ReplayMode,
    };
}
