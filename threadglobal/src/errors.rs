//! Error types for threadglobal.
//!
//! Storage operations on the thread-local registry never fail: an unset name
//! is reported as `None`. Errors only arise at the edges, when a typed handle
//! cannot decode a stored value, when a pool refuses a job, or when a
//! submitted task does not complete normally.

use thiserror::Error;

/// The main error type for threadglobal operations.
#[derive(Debug, Error)]
pub enum ThreadGlobalError {
    /// A stored value could not be decoded as the handle's declared type.
    #[error("Type mismatch for global '{name}': expected {expected}: {source}")]
    TypeMismatch {
        /// The global name.
        name: String,
        /// The type the caller asked for.
        expected: &'static str,
        /// The decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for storage.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An executor refused a job.
    #[error("{0}")]
    Rejected(#[from] RejectedError),

    /// A submitted task did not produce a value.
    #[error("{0}")]
    Task(#[from] TaskError),

    /// Invalid pool configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error, typically a failed worker thread spawn.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ThreadGlobalError {
    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(
        name: impl Into<String>,
        expected: &'static str,
        source: serde_json::Error,
    ) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected,
            source,
        }
    }
}

/// Why an executor refused a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The executor has been shut down.
    Shutdown,
    /// The work queue is full and no more threads may be started.
    QueueFull,
    /// A worker thread was needed but could not be created.
    SpawnFailed,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shutdown => write!(f, "executor is shut down"),
            Self::QueueFull => write!(f, "work queue is full"),
            Self::SpawnFailed => write!(f, "worker thread could not be started"),
        }
    }
}

/// Error raised when a job is refused at submission. The job is dropped.
#[derive(Debug, Clone, Error)]
#[error("Job rejected: {reason}")]
pub struct RejectedError {
    /// The rejection reason.
    pub reason: RejectReason,
}

impl RejectedError {
    /// Creates a rejection caused by shutdown.
    #[must_use]
    pub fn shutdown() -> Self {
        Self {
            reason: RejectReason::Shutdown,
        }
    }

    /// Creates a rejection caused by a saturated queue.
    #[must_use]
    pub fn queue_full() -> Self {
        Self {
            reason: RejectReason::QueueFull,
        }
    }

    /// Creates a rejection caused by a failed worker spawn.
    #[must_use]
    pub fn spawn_failed() -> Self {
        Self {
            reason: RejectReason::SpawnFailed,
        }
    }
}

/// Outcome of a submitted task that did not return a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task panicked; carries the panic message when it was a string.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task was dropped before it ran.
    #[error("Task cancelled before it ran")]
    Cancelled,

    /// `join_timeout` elapsed first. The task may still complete later.
    #[error("Timed out waiting for task")]
    TimedOut,
}

impl TaskError {
    /// Builds a `Panicked` error from a `catch_unwind` payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked(message)
    }
}
