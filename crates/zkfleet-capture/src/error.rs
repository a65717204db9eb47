//! Error types for the live-capture pipeline.
//!
//! The taxonomy follows the failure-handling design: terminal failures are
//! retried by the owning worker, sink failures are isolated to one event,
//! export I/O failures surface synchronously to the caller, and destructive
//! operations refuse to run without explicit confirmation. None of these
//! terminate the process or sibling workers.

use std::path::PathBuf;

/// Result type alias for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Errors that can occur in the capture pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Terminal communication failure (handled by worker retry policy).
    #[error(transparent)]
    Terminal(#[from] zkfleet_terminal::TerminalError),

    /// Consumer sink failure; isolated to the single event it was given.
    #[error("Event sink error: {message}")]
    Sink { message: String },

    /// The controller's event stream is already being consumed.
    #[error("An event sink is already attached to this controller")]
    SinkAlreadyAttached,

    /// Export could not write its artifact.
    #[error("Export to {path} failed: {source}")]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destructive operation invoked without explicit confirmation.
    #[error("Destructive operation requires explicit confirmation")]
    NotConfirmed,
}

impl CaptureError {
    /// Create a new sink error.
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Create a new export I/O error.
    pub fn export_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ExportIo {
            path: path.into(),
            source,
        }
    }
}
