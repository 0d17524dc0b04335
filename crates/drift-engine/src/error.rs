//! Error types for the drift engine.

use thiserror::Error;

/// Failures reported by a vault or cluster capability.
///
/// These never escape the scan path; the rotation workflow turns them into
/// outcome messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The backing system could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The caller is not allowed to perform the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The requested object does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of object that was looked up.
        kind: String,
        /// Name of the missing object.
        name: String,
    },

    /// The backend refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ClientError {
    /// Shorthand for a [`ClientError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

/// Errors raised by the engine itself.
#[derive(Debug, Error)]
pub enum Error {
    /// A capability call failed and the caller asked for the error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Configuration is missing or invalid.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// An expiry date could not be parsed.
    #[error("invalid expiry date '{input}': {reason}")]
    InvalidExpiry {
        /// The rejected input.
        input: String,
        /// Parser message.
        reason: String,
    },

    /// Snapshot or config file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {reason}")]
    Serialization {
        /// The reason serialization failed.
        reason: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
