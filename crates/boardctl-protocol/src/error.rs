//! Error types for the board protocol.

use thiserror::Error;

/// Errors that can occur when working with the board protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The response did not contain the expected field.
    #[error("failed to get {0}")]
    FieldNotFound(String),

    /// The field was present but its value is not a number.
    #[error("invalid {field} value: {value:?}")]
    NumericParse {
        /// Name of the field being parsed.
        field: String,
        /// The raw text that failed to parse.
        value: String,
    },

    /// Invalid argument for a command.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
