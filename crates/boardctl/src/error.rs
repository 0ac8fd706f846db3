//! Error types for board control.

use std::io;
use std::time::Duration;

use boardctl_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while talking to the board.
#[derive(Debug, Error)]
pub enum BoardError {
    /// The lock file could not be created or locked.
    #[error("failed to lock {resource}: {source}")]
    LockAcquire {
        /// The lock resource (file path or in-process name).
        resource: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A bounded lock wait ran out.
    #[error("timed out after {waited:?} waiting for lock {resource}")]
    LockTimeout {
        /// The lock resource.
        resource: String,
        /// How long we waited.
        waited: Duration,
    },

    /// The lock could not be released or its file could not be removed.
    #[error("failed to release lock {resource}: {source}")]
    LockRelease {
        /// The lock resource.
        resource: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The port could not be opened.
    #[error("failed to open port {device}: {source}")]
    Port {
        /// The device that failed to open.
        device: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Writing the command to the port failed.
    #[error("failed to write {command:?} to port: {source}")]
    Write {
        /// The command being written.
        command: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// No prompt-terminated reply arrived in time.
    #[error("command timeout: {command}")]
    Timeout {
        /// The command that timed out.
        command: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The reply did not contain a well-formed field.
    #[error("failed to parse {command} response: {source}")]
    Parse {
        /// The command whose reply was parsed.
        command: String,
        /// Underlying protocol error.
        #[source]
        source: ProtocolError,
    },

    /// Malformed input at the process boundary.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// The exchange worker could not be started or died unexpectedly.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl BoardError {
    /// Whether this error came from the lock manager.
    pub fn is_lock_error(&self) -> bool {
        matches!(
            self,
            BoardError::LockAcquire { .. }
                | BoardError::LockTimeout { .. }
                | BoardError::LockRelease { .. }
        )
    }

    /// Wrap a reply parsing failure with the command that produced the reply.
    pub fn parse(command: impl Into<String>, source: ProtocolError) -> Self {
        BoardError::Parse {
            command: command.into(),
            source,
        }
    }

    /// Turn a rejected argument into an [`BoardError::Argument`].
    pub fn argument(source: ProtocolError) -> Self {
        match source {
            ProtocolError::InvalidArgument(msg) => BoardError::Argument(msg),
            other => BoardError::Argument(other.to_string()),
        }
    }
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;
