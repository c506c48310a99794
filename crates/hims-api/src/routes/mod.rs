//! # API Route Modules
//!
//! Route modules for the `/api/v1` surface:
//!
//! - `auth`: registration, login, token refresh, current account.
//! - `users`: the caller's own profile.
//! - `persons`: the caller's dependents.
//! - `locations`: public reads of the state → school hierarchy.
//! - `insurance`: public plan catalogue; registration for the caller.
//! - `documents`: uploads, downloads and admin verification.
//! - `statistics`: admin dashboards and per-user summaries.
//! - `admin`: account, dependent and registration management.
//! - `admin_insurance`: plan and coverage management.
//! - `admin_locations`: location hierarchy and school management.

pub mod admin;
pub mod admin_insurance;
pub mod admin_locations;
pub mod auth;
pub mod documents;
pub mod insurance;
pub mod locations;
pub mod persons;
pub mod statistics;
pub mod users;

use axum::Router;
use chrono::{NaiveDate, Utc};

use crate::error::AppError;
use crate::state::AppState;

/// Every `/api/v1` route.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(persons::router())
        .merge(locations::router())
        .merge(insurance::router())
        .merge(documents::router())
        .merge(statistics::router())
        .merge(admin::router())
        .merge(admin_insurance::router())
        .merge(admin_locations::router())
}

/// Runs Argon2 on the blocking pool.
pub(crate) async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hims_core::password::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(AppError::from)
}

pub(crate) async fn verify_password(password: String, stored: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || hims_core::password::verify_password(&password, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("password verification task failed: {e}")))
}

/// Reference date for ages.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Simple `{message}` acknowledgement.
#[derive(Debug, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
