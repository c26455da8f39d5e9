//! Error types for the server.

use arbordb_core::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format or parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request body is not valid JSON.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Error from the database core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// The HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) | ServerError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ServerError::Core(err) => match err {
                CoreError::InvalidRequest { .. }
                | CoreError::InvalidPayload { .. }
                | CoreError::InvalidPattern { .. } => StatusCode::BAD_REQUEST,
                CoreError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::AlreadyExists { .. } => StatusCode::CONFLICT,
                CoreError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                CoreError::Io(_) | CoreError::CorruptEntry { .. } | CoreError::State { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::Config(_) | ServerError::Internal(_) | ServerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    detail: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        // Denials carry no detail that could reveal stored data.
        let detail = match &self {
            ServerError::Core(CoreError::Unauthorized { .. }) => "unauthorized".to_string(),
            _ => self.to_string(),
        };
        let body = ErrorBody {
            status: status.as_u16(),
            detail,
        };
        (status, Json(body)).into_response()
    }
}
