//! Error types for the cache library and server
//!
//! Cache lookups never fail; errors cover reaper start-up and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache library and server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The reaper thread or its runtime could not be started
    #[error("Failed to start reaper: {0}")]
    Spawn(#[source] std::io::Error),

    /// Key not found in cache, or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Spawn(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache library and server.
pub type Result<T> = std::result::Result<T, CacheError>;
