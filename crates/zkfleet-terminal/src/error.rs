//! Error types for terminal communication.
//!
//! The taxonomy mirrors how the capture layer reacts to failures:
//! connection errors (including timeouts) are recoverable and retried with
//! backoff, protocol errors degrade one fetch to an empty result, and I/O
//! errors surface as-is.

/// Result type alias for terminal operations.
pub type Result<T> = std::result::Result<T, TerminalError>;

/// Errors that can occur while talking to an attendance terminal.
#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    /// Terminal is unreachable or refused the connection.
    #[error("Connection to {device} failed: {message}")]
    Connection { device: String, message: String },

    /// Connect or request did not complete within the allotted time.
    #[error("Timeout talking to {device} after {duration_ms}ms")]
    Timeout { device: String, duration_ms: u64 },

    /// Terminal answered with a malformed or unexpected response.
    #[error("Protocol error from {device}: {message}")]
    Protocol { device: String, message: String },

    /// Session was used after disconnect.
    #[error("Session to {device} is closed")]
    SessionClosed { device: String },

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TerminalError {
    /// Create a new connection error.
    pub fn connection(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(device: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            device: device.into(),
            duration_ms,
        }
    }

    /// Create a new protocol error.
    pub fn protocol(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a new session-closed error.
    pub fn session_closed(device: impl Into<String>) -> Self {
        Self::SessionClosed {
            device: device.into(),
        }
    }

    /// Whether this failure is a transient connectivity problem that the
    /// caller should retry with backoff.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Whether this failure is a malformed response; the affected fetch is
    /// treated as empty and retried next cycle.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}
