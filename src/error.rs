use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Unified error type for the console relay
#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Asset errors
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Viewer bundle missing: {}", .0.display())]
    ViewerBundleMissing(PathBuf),

    #[error("Viewer build failed: {0}")]
    BuildFailed(String),

    // Relay errors
    #[error("Relay is shutting down")]
    RelayClosed,

    // Startup errors
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            RelayError::InvalidConfig(_) => StatusCode::BAD_REQUEST,

            // 404 Not Found
            RelayError::AssetNotFound(_) => StatusCode::NOT_FOUND,

            // 503 Service Unavailable
            RelayError::RelayClosed => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            RelayError::ViewerBundleMissing(_)
            | RelayError::BuildFailed(_)
            | RelayError::Bind { .. }
            | RelayError::Io(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Internal causes are logged here and never echoed to the client.
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
