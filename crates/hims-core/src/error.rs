//! # Error Hierarchy
//!
//! Structured error types for the model layer, built with `thiserror`.
//!
//! [`HimsError`] is what every store operation returns. It distinguishes the
//! three relational failures a caller has to react to differently (missing
//! row, uniqueness conflict, protected reference) from field-level
//! [`ValidationError`]s.

use chrono::NaiveDate;
use thiserror::Error;

/// Top-level error type for the model layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HimsError {
    /// A referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Table name of the missing row.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A uniqueness or single-open-registration rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// A delete was refused because a protecting foreign key still points
    /// at the row (directly or through the cascade below it).
    #[error("cannot delete {entity} {id}: still referenced by {count} {referrer}")]
    Protected {
        /// Table of the row being deleted.
        entity: &'static str,
        /// Identifier of the row being deleted.
        id: String,
        /// Table holding the protecting references.
        referrer: &'static str,
        /// How many protecting rows were found.
        count: usize,
    },

    /// Field-level validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Password hashing backend failure.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl HimsError {
    /// Shorthand for a [`HimsError::NotFound`] keyed by any displayable id.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Field-level validation errors.
///
/// Each variant carries the rejected input so an operator can see what was
/// sent without reproducing the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// National id / national code is not exactly ten ASCII digits.
    #[error("invalid national id: \"{0}\" (expected 10 digits)")]
    InvalidNationalId(String),

    /// Mobile or landline number is not exactly eleven ASCII digits.
    #[error("invalid phone number: \"{0}\" (expected 11 digits)")]
    InvalidPhone(String),

    /// Email address does not have a `local@domain.tld` shape.
    #[error("invalid email address: \"{0}\"")]
    InvalidEmail(String),

    /// A text field is shorter or longer than allowed.
    #[error("{field} must be between {min} and {max} characters (got {actual})")]
    Length {
        /// Field name as it appears in requests.
        field: &'static str,
        /// Minimum character count.
        min: usize,
        /// Maximum character count.
        max: usize,
        /// Character count that was supplied.
        actual: usize,
    },

    /// An enumerated field carried a value outside its choices.
    #[error("unknown {kind} \"{value}\" (expected one of: {expected})")]
    UnknownChoice {
        /// Name of the enumeration.
        kind: &'static str,
        /// Rejected value.
        value: String,
        /// Comma-separated list of accepted values.
        expected: String,
    },

    /// A numeric field is outside its allowed range.
    #[error("{field} must be {constraint} (got {actual})")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Human-readable constraint, e.g. "greater than 0".
        constraint: &'static str,
        /// Value that was supplied.
        actual: i64,
    },

    /// A birth date lies after the reference date.
    #[error("birth date {0} is in the future")]
    FutureBirthDate(NaiveDate),

    /// Coverage period ends before it starts.
    #[error("start date {start} is after end date {end}")]
    DateOrder {
        /// Period start.
        start: NaiveDate,
        /// Period end.
        end: NaiveDate,
    },

    /// Password below the minimum length.
    #[error("password must be at least {min} characters")]
    PasswordTooShort {
        /// Minimum length.
        min: usize,
    },

    /// Uploaded file extension is not on the allow-list.
    #[error("unsupported file type \"{0}\" (allowed: pdf, jpg, jpeg, png, doc, docx, zip, rar)")]
    FileExtension(String),

    /// Uploaded file exceeds the size cap.
    #[error("file is too large: {size} bytes (maximum {max} bytes)")]
    FileTooLarge {
        /// Size of the upload.
        size: u64,
        /// Size cap.
        max: u64,
    },

    /// Uploaded file has no content.
    #[error("uploaded file is empty")]
    EmptyFile,

    /// `additional_info` must be a JSON object.
    #[error("additional_info must be a JSON object")]
    AdditionalInfoNotObject,
}
