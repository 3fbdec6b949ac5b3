//! # Dispatch Errors
//!
//! Error types for request dispatch and their HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::response::ApiResponse;
use crate::catalog::QueryError;
use crate::marshal::MarshalError;
use crate::resilience::ResiliencyError;

/// A request that matched a route but cannot be served
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// Path parameter is outside the store's parameter type
    #[error("bad parameter {value}: {reason}")]
    BadParameter { value: String, reason: String },
}

/// Result type for dispatch
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Everything that can fail while serving a matched route
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    // ==================
    // Client Errors (4xx)
    // ==================
    #[error(transparent)]
    Request(#[from] RequestError),

    // ==================
    // Server Errors (5xx)
    // ==================
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// The store could not be reopened
    #[error(transparent)]
    Unrecoverable(#[from] ResiliencyError),
}

impl DispatchError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::Request(_) => StatusCode::BAD_REQUEST,
            DispatchError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Marshal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::Unrecoverable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&DispatchError> for ApiResponse {
    fn from(err: &DispatchError) -> Self {
        ApiResponse::for_status(err.status_code())
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        ApiResponse::from(&self).into_response()
    }
}
