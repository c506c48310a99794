//! # Profile API
//!
//! - `GET /api/v1/users/profile`: the caller's profile
//! - `PUT /api/v1/users/profile`: partial update of names, phone and email

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use hims_core::User;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::Change;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub national_id: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for ProfileResponse {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            national_id: u.national_id.to_string(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            phone: u.phone.clone(),
            is_admin: u.is_admin,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

/// Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/users/profile", get(get_profile).put(update_profile))
}

/// GET /api/v1/users/profile
#[utoipa::path(
    get,
    path = "/api/v1/users/profile",
    responses(
        (status = 200, description = "Caller's profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn get_profile(CurrentUser(user): CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse::from(&user))
}

/// PUT /api/v1/users/profile
#[utoipa::path(
    put,
    path = "/api/v1/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 409, description = "Email used by another account", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, AppError> {
    let req = extract_json(body)?;
    let updated = state.db.update_user(&user.id, |u| {
        if let Some(first_name) = req.first_name {
            u.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            u.last_name = last_name;
        }
        if let Some(phone) = req.phone {
            u.phone = Some(phone);
        }
        if let Some(email) = req.email {
            u.email = Some(email);
        }
    })?;
    state.persist(Change::User(&updated)).await?;
    Ok(Json(ProfileResponse::from(&updated)))
}
