//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps [`HimsError`] from the model layer to HTTP status codes and renders
//! every failure as the same JSON envelope. Internal error details are
//! logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hims_core::{HimsError, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API surface.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context. Present for refused deletes (which table still
    /// references the row, and how many times).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found, or owned by someone else (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request body parsed but a field failed validation (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed request: bad JSON, query string or upload (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing, invalid or expired credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness or single-open-registration violation (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Delete refused because other rows still reference the target (409).
    #[error("conflict: {message}")]
    Referenced {
        message: String,
        referrer: &'static str,
        count: usize,
    },

    /// Upload above the size cap (413).
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// A required backing service (the database) is unreachable (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) | Self::Referenced { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let details = match &self {
            Self::Referenced { referrer, count, .. } => {
                Some(serde_json::json!({ "referrer": referrer, "count": count }))
            }
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<HimsError> for AppError {
    fn from(err: HimsError) -> Self {
        match err {
            HimsError::NotFound { .. } => Self::NotFound(err.to_string()),
            HimsError::Conflict(msg) => Self::Conflict(msg),
            HimsError::Protected {
                referrer, count, ..
            } => Self::Referenced {
                message: err.to_string(),
                referrer,
                count,
            },
            HimsError::Validation(inner) => Self::Validation(inner.to_string()),
            HimsError::PasswordHash(_) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status_code() {
        let err = AppError::NotFound("missing person".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn validation_status_code() {
        let err = AppError::Validation("bad field".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn bad_request_status_code() {
        let err = AppError::BadRequest("malformed JSON".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn auth_status_codes() {
        let (status, code) = AppError::Unauthorized("no token".into()).status_and_code();
        assert_eq!((status, code), (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"));
        let (status, code) = AppError::Forbidden("admin only".into()).status_and_code();
        assert_eq!((status, code), (StatusCode::FORBIDDEN, "FORBIDDEN"));
    }

    #[test]
    fn payload_too_large_status_code() {
        let (status, code) = AppError::PayloadTooLarge("11 MiB".into()).status_and_code();
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(code, "PAYLOAD_TOO_LARGE");
    }

    #[test]
    fn service_unavailable_status_code() {
        let (status, code) = AppError::ServiceUnavailable("db down".into()).status_and_code();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "SERVICE_UNAVAILABLE");
    }

    #[test]
    fn hims_errors_map_to_statuses() {
        let cases = [
            (HimsError::not_found("school", "x"), StatusCode::NOT_FOUND),
            (HimsError::Conflict("taken".into()), StatusCode::CONFLICT),
            (
                HimsError::Protected {
                    entity: "school",
                    id: "x".into(),
                    referrer: "insurance registrations",
                    count: 1,
                },
                StatusCode::CONFLICT,
            ),
            (
                HimsError::Validation(ValidationError::EmptyFile),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                HimsError::PasswordHash("rng".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = AppError::from(err).status_and_code();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn error_body_serializes() {
        let body = ErrorBody::new("TEST", "test message");
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("TEST"));
        assert!(json.contains("test message"));
        assert!(!json.contains("details"));
    }

    // ── into_response tests ──────────────────────────────────────

    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn into_response_not_found() {
        let (status, body) = response_parts(AppError::NotFound("person 123".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("person 123"));
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn into_response_conflict() {
        let (status, body) = response_parts(AppError::Conflict("already exists".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "CONFLICT");
        assert!(body.error.message.contains("already exists"));
    }

    #[tokio::test]
    async fn into_response_protected_delete_carries_details() {
        let err = AppError::from(HimsError::Protected {
            entity: "state",
            id: "s-1".into(),
            referrer: "insurance registrations",
            count: 3,
        });
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let details = body.error.details.unwrap();
        assert_eq!(details["referrer"], "insurance registrations");
        assert_eq!(details["count"], 3);
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(
            !body.error.message.contains("db connection"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert_eq!(body.error.message, "An internal error occurred");
    }
}
