//! Error types for ArborDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in ArborDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Key-value store error.
    #[error("storage error: {0}")]
    Storage(#[from] arbordb_storage::StorageError),

    /// I/O error while loading or saving server state.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The request is malformed (path, database id, parameters).
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what is wrong.
        message: String,
    },

    /// The write payload is not acceptable JSON for the operation.
    #[error("invalid payload: {message}")]
    InvalidPayload {
        /// Description of what is wrong.
        message: String,
    },

    /// The caller is not permitted to perform the operation.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Why access was refused. Never reveals stored data.
        reason: String,
    },

    /// A referenced rule, key or realm does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up ("rule", "key", ...).
        kind: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// An entity with the same identifier already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// What was created ("key", ...).
        kind: &'static str,
        /// The conflicting identifier.
        id: String,
    },

    /// A rule pattern failed to compile.
    #[error("invalid rule pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// A stored flat key or leaf value cannot be decoded.
    #[error("corrupt entry {key:?}: {message}")]
    CorruptEntry {
        /// The flat key.
        key: String,
        /// Description of the problem.
        message: String,
    },

    /// Server state could not be serialized or deserialized.
    #[error("state error: {message}")]
    State {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an invalid payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    /// Creates a corrupt entry error.
    pub fn corrupt_entry(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptEntry {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by the caller.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::InvalidPayload { .. }
                | Self::Unauthorized { .. }
                | Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::InvalidPattern { .. }
        )
    }

    /// Returns true if the error is a transient backend failure worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbordb_storage::StorageError;

    #[test]
    fn error_classification() {
        assert!(CoreError::invalid_request("bad").is_client_error());
        assert!(CoreError::not_found("rule", "r1").is_client_error());
        assert!(!CoreError::state("oops").is_client_error());

        let storage: CoreError = StorageError::Unavailable("down".into()).into();
        assert!(storage.is_retryable());
        assert!(!storage.is_client_error());
    }

    #[test]
    fn error_display() {
        let err = CoreError::not_found("key", "k-42");
        assert_eq!(err.to_string(), "key not found: k-42");
    }
}
