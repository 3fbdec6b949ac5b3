//! Response values produced by the dispatcher

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

use crate::marshal::{MarshalError, MarshalResult};

pub const NOT_FOUND_BODY: &str =
    "<h1>404</h1>\nYour call cannot be completed as dialed.\nPlease hang up and try again.\n";

pub const INTERNAL_ERROR_BODY: &str =
    "<h1>500</h1>\nInternal Server Error!\n I don't feel so good Mr. Stark.";

pub const BAD_REQUEST_BODY: &str = "<h1>400</h1>\nThat number is not one we can dial.\n";

/// What the dispatcher hands back to the server shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse {
    /// 200 with a pretty-printed JSON document
    Json { body: Vec<u8> },
    /// 200 with raw bytes, connection closed after sending
    Blob { bytes: Vec<u8> },
    /// Fixed-body status reply
    Status {
        status: StatusCode,
        body: &'static str,
    },
}

impl ApiResponse {
    /// Serialize `value` with 4-space indentation and a trailing newline
    pub fn json(value: &Value) -> MarshalResult<Self> {
        let mut body = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut body, PrettyFormatter::with_indent(b"    "));
        value
            .serialize(&mut serializer)
            .map_err(|e| MarshalError::Encode(e.to_string()))?;
        body.push(b'\n');

        Ok(ApiResponse::Json { body })
    }

    pub fn blob(bytes: Vec<u8>) -> Self {
        ApiResponse::Blob { bytes }
    }

    pub fn not_found() -> Self {
        ApiResponse::Status {
            status: StatusCode::NOT_FOUND,
            body: NOT_FOUND_BODY,
        }
    }

    pub fn internal_error() -> Self {
        ApiResponse::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: INTERNAL_ERROR_BODY,
        }
    }

    pub fn bad_request() -> Self {
        ApiResponse::Status {
            status: StatusCode::BAD_REQUEST,
            body: BAD_REQUEST_BODY,
        }
    }

    /// Fixed-body reply for an error status
    pub fn for_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::bad_request(),
            StatusCode::NOT_FOUND => Self::not_found(),
            _ => Self::internal_error(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiResponse::Json { .. } | ApiResponse::Blob { .. } => StatusCode::OK,
            ApiResponse::Status { status, .. } => *status,
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            ApiResponse::Json { body } => body,
            ApiResponse::Blob { bytes } => bytes,
            ApiResponse::Status { body, .. } => body.as_bytes(),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Json { body } => (
                StatusCode::OK,
                [
                    (CONTENT_TYPE, "application/json"),
                    (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                ],
                body,
            )
                .into_response(),
            ApiResponse::Blob { bytes } => (
                StatusCode::OK,
                [
                    (CONTENT_LENGTH, bytes.len().to_string()),
                    (CONNECTION, "close".to_string()),
                ],
                bytes,
            )
                .into_response(),
            ApiResponse::Status { status, body } => {
                (status, [(CONTENT_TYPE, "text/html")], body).into_response()
            }
        }
    }
}
