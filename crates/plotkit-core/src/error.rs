//! Error handling for plotkit
//!
//! Provides error types for all layers of the driver:
//! - Transport errors (serial/TCP link failures)
//! - Protocol errors (acknowledgement failures, job cancellation)
//! - Worker errors (command validation and state machine violations)
//!
//! All error types use `thiserror` for ergonomic error handling.
//!
//! The split matters for recovery policy: transport and ack errors are
//! fatal to the worker that owns the link, while worker errors (and a
//! cancelled job) are local and leave the worker ready for the next
//! command.

use thiserror::Error;

/// Transport error type
///
/// Represents failures on the physical link. Any of these invalidates
/// the cached connection handle; none of them is retried automatically.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Failed to open or connect the link
    #[error("Failed to open {target}: {reason}")]
    ConnectFailed {
        /// Port path or host:port that failed to open.
        target: String,
        /// The reason the connection failed.
        reason: String,
    },

    /// The connect-time protocol banner did not match
    #[error("Unrecognized protocol banner: {banner}")]
    BannerMismatch {
        /// The banner line actually received.
        banner: String,
    },

    /// Read or write timed out
    #[error("Transport timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The transport has been invalidated and will not reconnect
    #[error("Transport disconnected")]
    Disconnected,

    /// Generic I/O failure on the link
    #[error("Transport I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Protocol error type
///
/// Represents errors in the line-oriented command/ack exchange.
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    /// The device answered something other than an "OK" line
    #[error("Invalid response from plotter: {response:?}")]
    BadAck {
        /// The response line actually received.
        response: String,
    },

    /// The in-flight job was cancelled via the progress callback
    #[error("Plot job cancelled")]
    Cancelled,
}

/// Worker error type
///
/// Command validation and state machine violations inside the plot
/// worker. These are always recoverable: the offending command gets an
/// ERR response and the worker state is unchanged.
#[derive(Error, Debug, Clone)]
pub enum WorkerError {
    /// A program is staged or streaming and the command cannot run now
    #[error("Existing program already running")]
    AlreadyRunning,

    /// The worker is busy with another state-changing command
    #[error("Worker busy: {state} is invalid for {command}")]
    Busy {
        /// The worker state at dispatch time.
        state: String,
        /// The command kind that was rejected.
        command: String,
    },

    /// CANCEL was issued while the job was not paused
    #[error("Must pause before cancelling")]
    NotPaused,

    /// START was issued with no staged program
    #[error("No program loaded")]
    NoProgram,

    /// The command line did not match `KIND[id](:content)?`
    #[error("Malformed command: {line:?}")]
    MalformedCommand {
        /// The offending command line (possibly truncated).
        line: String,
    },

    /// The command payload failed validation
    #[error("Invalid payload for {command}: {reason}")]
    InvalidPayload {
        /// The command kind with the bad payload.
        command: String,
        /// The reason the payload is invalid.
        reason: String,
    },

    /// A move target is outside the machine's travel limits
    #[error("Target ({x:.2}, {y:.2}) outside travel limits")]
    OutOfLimits {
        /// Target X in millimetres.
        x: f64,
        /// Target Y in millimetres.
        y: f64,
    },

    /// The worker thread has exited; the instance must be replaced
    #[error("Worker is dead")]
    Dead,
}

/// Main error type for plotkit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Worker error
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Fatal errors terminate the owning worker; everything else is a
    /// recoverable ERR response.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Protocol(ProtocolError::BadAck { .. }) | Error::Io(_)
        )
    }

    /// Check if this is a cancelled plot job
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Protocol(ProtocolError::Cancelled))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_fatal() {
        let err: Error = TransportError::Disconnected.into();
        assert!(err.is_fatal());
        let err: Error = ProtocolError::BadAck {
            response: "!!".into(),
        }
        .into();
        assert!(err.is_fatal());
    }

    #[test]
    fn worker_errors_are_recoverable() {
        let err: Error = WorkerError::NotPaused.into();
        assert!(!err.is_fatal());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancellation_is_recoverable() {
        let err: Error = ProtocolError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(!err.is_fatal());
    }
}
