//! API error types with IntoResponse
//!
//! Errors are converted to JSON `{error, message}` bodies with appropriate
//! status codes. The HTTP gateway reads `message` back out.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use caredesk_core::error::CoreError;
use serde_json::json;

use crate::store::StoreError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Field validation failed (422)
    Validation { field: String, message: String },

    /// Unparsable request (400)
    BadRequest { message: String },

    /// Unknown entity kind or record (404)
    NotFound { resource: String, id: String },

    /// Internal error (500)
    Internal { message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "validation_error",
                    "field": field,
                    "message": message
                }),
            ),
            Self::BadRequest { message } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "bad_request",
                    "message": message
                }),
            ),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => Self::NotFound {
                resource: entity.to_owned(),
                id,
            },
            StoreError::Invalid { field, message } => Self::Validation { field, message },
            malformed @ StoreError::Malformed { .. } => Self::BadRequest {
                message: malformed.to_string(),
            },
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownEntity { key } => Self::NotFound {
                resource: "entity".into(),
                id: key,
            },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}
