//! Logging setup.
//!
//! The crate itself only emits `tracing` events: pool lifecycle at `debug`,
//! registry swaps at `trace`, rejections and job panics at `warn`/`error`.
//! Each pool job runs inside a `job` span (level `trace`) carrying the
//! worker id and, once the job returns, its `duration_ms`. Applications that
//! do not already install a subscriber can use [`init_logging`].

use crate::errors::ThreadGlobalError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "threadglobal=info";

/// Output format for [`init_logging`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to [`DEFAULT_FILTER`].
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging(format: LogFormat) {
    if let Err(err) = try_init_logging(format) {
        tracing::debug!(error = %err, "Logging already initialised");
    }
}

/// Like [`init_logging`], but reports an already-installed subscriber.
///
/// # Errors
///
/// Returns `Config` if a global subscriber has already been set.
pub fn try_init_logging(format: LogFormat) -> Result<(), ThreadGlobalError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = (format == LogFormat::Json).then(|| fmt::layer().json().with_current_span(false));
    let text = (format == LogFormat::Text).then(|| fmt::layer().with_thread_names(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .map_err(|e| ThreadGlobalError::Config(format!("logging: {e}")))
}
