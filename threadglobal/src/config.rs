//! Worker pool configuration.

use crate::errors::ThreadGlobalError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a pool does with a job it cannot queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Refuse the job with a `RejectedError`.
    #[default]
    Abort,
    /// Run the job on the submitting thread.
    CallerRuns,
    /// Drop the job silently.
    Discard,
    /// Drop the oldest queued job and queue this one.
    DiscardOldest,
}

/// Shape of the work queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueKind {
    /// No limit on queued jobs. Threads beyond `core_threads` are never
    /// started.
    #[default]
    Unbounded,
    /// At most `capacity` queued jobs. A capacity of zero hands each job
    /// directly to a thread.
    Bounded {
        /// Maximum number of queued jobs.
        capacity: usize,
    },
}

/// Configuration for a [`WorkerPool`](crate::executor::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Threads kept alive even when idle.
    #[serde(default = "default_core_threads")]
    pub core_threads: usize,
    /// Upper bound on threads. Extra threads are only started when the
    /// queue is bounded and full.
    #[serde(default = "default_core_threads")]
    pub max_threads: usize,
    /// How long a thread above `core_threads` waits for work before exiting.
    #[serde(default = "default_keep_alive_ms")]
    pub keep_alive_ms: u64,
    /// Work queue shape.
    #[serde(default)]
    pub queue: QueueKind,
    /// Behavior when a job cannot be queued.
    #[serde(default)]
    pub rejection: RejectionPolicy,
    /// Prefix for worker thread names; workers are named `{prefix}-{n}`.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// Worker stack size in bytes.
    #[serde(default)]
    pub stack_size: Option<usize>,
}

fn default_core_threads() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn default_keep_alive_ms() -> u64 {
    60_000
}

fn default_thread_name_prefix() -> String {
    "threadglobal-worker".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        let core_threads = default_core_threads();
        Self {
            core_threads,
            max_threads: core_threads,
            keep_alive_ms: default_keep_alive_ms(),
            queue: QueueKind::default(),
            rejection: RejectionPolicy::default(),
            thread_name_prefix: default_thread_name_prefix(),
            stack_size: None,
        }
    }
}

impl PoolConfig {
    /// Creates a new pool configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A pool of exactly `threads` threads over an unbounded queue.
    #[must_use]
    pub fn fixed(threads: usize) -> Self {
        Self::default().with_core_threads(threads).with_max_threads(threads)
    }

    /// Loads a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed JSON and `Config` if the result
    /// fails [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ThreadGlobalError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the core thread count.
    #[must_use]
    pub fn with_core_threads(mut self, threads: usize) -> Self {
        self.core_threads = threads;
        self
    }

    /// Sets the maximum thread count.
    #[must_use]
    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_threads = threads;
        self
    }

    /// Sets the keep-alive for threads above core.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive_ms = u64::try_from(keep_alive.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the queue shape.
    #[must_use]
    pub fn with_queue(mut self, queue: QueueKind) -> Self {
        self.queue = queue;
        self
    }

    /// Uses a bounded queue.
    #[must_use]
    pub fn with_bounded_queue(self, capacity: usize) -> Self {
        self.with_queue(QueueKind::Bounded { capacity })
    }

    /// Sets the rejection policy.
    #[must_use]
    pub fn with_rejection(mut self, rejection: RejectionPolicy) -> Self {
        self.rejection = rejection;
        self
    }

    /// Sets the worker name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the worker stack size.
    #[must_use]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Returns the keep-alive as a `Duration`.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// Returns the queue capacity, `None` when unbounded.
    #[must_use]
    pub fn queue_capacity(&self) -> Option<usize> {
        match self.queue {
            QueueKind::Unbounded => None,
            QueueKind::Bounded { capacity } => Some(capacity),
        }
    }

    /// Checks the thread counts.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `max_threads` is zero or below `core_threads`.
    pub fn validate(&self) -> Result<(), ThreadGlobalError> {
        if self.max_threads == 0 {
            return Err(ThreadGlobalError::Config(
                "max_threads must be at least 1".to_string(),
            ));
        }
        if self.max_threads < self.core_threads {
            return Err(ThreadGlobalError::Config(format!(
                "max_threads ({}) must not be below core_threads ({})",
                self.max_threads, self.core_threads
            )));
        }
        Ok(())
    }
}
