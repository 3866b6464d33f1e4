//! Task decorators that carry globals across thread boundaries.
//!
//! This module provides:
//! - PropagatingTask for closures handed to another thread or pool
//! - PropagatingFuture for async tasks that migrate between workers

mod future;
mod task;

pub use future::{spawn, GlobalsFutureExt, PropagatingFuture};
pub use task::{wrap, wrap_current, PropagatingTask, ReplayMode};
