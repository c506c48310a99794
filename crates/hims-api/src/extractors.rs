//! # Request Extraction Helpers
//!
//! Handlers take `Result<Json<T>, JsonRejection>` (or `Result<Query<T>, _>`)
//! instead of the bare extractor so rejections render as the standard
//! [`ErrorBody`](crate::error::ErrorBody) rather than axum's plain-text
//! default.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;

use crate::error::AppError;

/// Trait for request types that can validate their business rules
/// beyond what serde deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Extract query parameters. A missing required parameter or a malformed
/// UUID is a 400.
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}
