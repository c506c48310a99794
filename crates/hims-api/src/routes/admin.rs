//! # Admin Account & Registration API
//!
//! An administrator cannot deactivate, demote or delete their own account.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/admin/users` (`?is_admin=&is_active=&is_staff=&search=`)
//! - `PUT /api/v1/admin/users/:id/password`
//! - `POST /api/v1/admin/users/:id/reset-password`
//! - `PUT /api/v1/admin/users/:id/status`
//! - `DELETE /api/v1/admin/users/:id`
//! - `GET /api/v1/admin/persons`, `DELETE /api/v1/admin/persons/:id`
//! - `GET /api/v1/admin/registrations` (`?status=&plan_id=&search=`)
//! - `GET|DELETE /api/v1/admin/registrations/:id`
//! - `PUT /api/v1/admin/registrations/:id/status`

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use hims_core::password::generate_temporary;
use hims_core::store::{RegistrationFilter, UserFilter};
use hims_core::{InsuranceRegistration, PlanType, RegistrationStatus, Tables, User};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::insurance::RegistrationResponse;
use super::persons::PersonResponse;
use super::users::ProfileResponse;
use super::{today, MessageResponse};
use crate::auth::AdminUser;
use crate::db::{Change, Kind};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, extract_validated_json, Validate};
use crate::state::AppState;

/// Length of generated temporary passwords.
const TEMPORARY_PASSWORD_LEN: usize = 12;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub new_password: String,
}

impl Validate for SetPasswordRequest {
    fn validate(&self) -> Result<(), String> {
        if self.new_password.trim().is_empty() {
            return Err("new_password must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetPasswordResponse {
    pub message: String,
    /// Shown once; only the hash is stored.
    pub temporary_password: String,
}

/// Absent fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserStatusRequest {
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminPersonResponse {
    #[serde(flatten)]
    pub person: PersonResponse,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_national_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    /// National id, email, name or phone fragment.
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationQuery {
    pub status: Option<RegistrationStatus>,
    pub plan_id: Option<Uuid>,
    /// Owner's national id, name or email fragment.
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminRegistrationResponse {
    #[serde(flatten)]
    pub registration: RegistrationResponse,
    pub user_name: String,
    pub plan_name: String,
    pub school_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminRegistrationDetail {
    #[serde(flatten)]
    pub registration: RegistrationResponse,
    pub user_name: String,
    pub user_email: Option<String>,
    pub user_national_id: String,
    pub plan_name: String,
    pub plan_type: Option<PlanType>,
    pub monthly_premium: Option<i64>,
    pub school_name: String,
    pub school_code: Option<String>,
    /// Covered dependents.
    pub persons: Vec<PersonResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRegistrationStatusRequest {
    pub status: RegistrationStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/users", get(list_users))
        .route("/api/v1/admin/users/:id", delete(delete_user))
        .route("/api/v1/admin/users/:id/password", put(set_password))
        .route("/api/v1/admin/users/:id/reset-password", post(reset_password))
        .route("/api/v1/admin/users/:id/status", put(update_status))
        .route("/api/v1/admin/persons", get(list_persons))
        .route("/api/v1/admin/persons/:id", delete(delete_person))
        .route("/api/v1/admin/registrations", get(list_registrations))
        .route(
            "/api/v1/admin/registrations/:id",
            get(get_registration).delete(delete_registration),
        )
        .route("/api/v1/admin/registrations/:id/status", put(update_registration_status))
}

fn user_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("user {id} not found"))
}

fn name_of(t: &Tables, user_id: &Uuid) -> String {
    t.users.get(user_id).map(User::full_name).unwrap_or_default()
}

fn summarize(t: &Tables, reg: &InsuranceRegistration) -> AdminRegistrationResponse {
    AdminRegistrationResponse {
        registration: RegistrationResponse::from(reg),
        user_name: name_of(t, &reg.user_id),
        plan_name: t.plans.get(&reg.plan_id).map(|p| p.name_fa.clone()).unwrap_or_default(),
        school_name: t.schools.get(&reg.school_id).map(|s| s.name_fa.clone()).unwrap_or_default(),
    }
}

// ── User handlers ───────────────────────────────────────────────────

/// GET /api/v1/admin/users: Accounts, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(
        ("is_admin" = Option<bool>, Query, description = "Only administrators, or only non-administrators"),
        ("is_active" = Option<bool>, Query, description = "Only active, or only deactivated accounts"),
        ("is_staff" = Option<bool>, Query, description = "Only staff, or only non-staff accounts"),
        ("search" = Option<String>, Query, description = "National id, email, name or phone fragment"),
    ),
    responses(
        (status = 200, description = "Accounts", body = Vec<ProfileResponse>),
        (status = 400, description = "Malformed query", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<ProfileResponse>>, AppError> {
    let q = extract_query(query)?;
    let users = state.db.search_users(&UserFilter {
        is_admin: q.is_admin,
        is_active: q.is_active,
        is_staff: q.is_staff,
        search: q.search,
    });
    Ok(Json(users.iter().map(ProfileResponse::from).collect()))
}

/// PUT /api/v1/admin/users/:id/password: Set a chosen password.
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/password",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorBody),
        (status = 422, description = "Password too weak", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn set_password(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    body: Result<Json<SetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = extract_validated_json(body)?;
    state.db.get_user(&id).ok_or_else(|| user_not_found(id))?;
    let password_hash = super::hash_password(req.new_password).await?;
    let user = state.db.update_user(&id, |u| u.password_hash = password_hash)?;
    state.persist(Change::User(&user)).await?;
    tracing::info!(user_id = %id, admin_id = %admin.id, "password set by admin");
    Ok(Json(MessageResponse::new(format!(
        "password updated for {}",
        user.national_id
    ))))
}

/// POST /api/v1/admin/users/:id/reset-password: Replace the password with a
/// generated one and return it.
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/reset-password",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Temporary password issued", body = ResetPasswordResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn reset_password(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ResetPasswordResponse>, AppError> {
    state.db.get_user(&id).ok_or_else(|| user_not_found(id))?;
    let temporary = generate_temporary(TEMPORARY_PASSWORD_LEN);
    let password_hash = super::hash_password(temporary.clone()).await?;
    let user = state.db.update_user(&id, |u| u.password_hash = password_hash)?;
    state.persist(Change::User(&user)).await?;
    tracing::info!(user_id = %id, admin_id = %admin.id, "password reset by admin");
    Ok(Json(ResetPasswordResponse {
        message: format!("password reset for {}", user.national_id),
        temporary_password: temporary,
    }))
}

/// PUT /api/v1/admin/users/:id/status: Activate, deactivate, promote or
/// demote an account.
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/status",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserStatusRequest,
    responses(
        (status = 200, description = "Account updated", body = ProfileResponse),
        (status = 400, description = "Would deactivate or demote the caller", body = crate::error::ErrorBody),
        (status = 404, description = "User not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateUserStatusRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, AppError> {
    let req = extract_json(body)?;
    if id == admin.id {
        if req.is_active == Some(false) {
            return Err(AppError::BadRequest("cannot deactivate your own account".to_string()));
        }
        if req.is_admin == Some(false) {
            return Err(AppError::BadRequest("cannot remove your own admin rights".to_string()));
        }
    }
    let user = state.db.update_user(&id, |u| {
        if let Some(active) = req.is_active {
            u.is_active = active;
        }
        if let Some(is_admin) = req.is_admin {
            u.is_admin = is_admin;
        }
    })?;
    state.persist(Change::User(&user)).await?;
    tracing::info!(
        user_id = %id,
        admin_id = %admin.id,
        is_active = user.is_active,
        is_admin = user.is_admin,
        "account status changed"
    );
    Ok(Json(ProfileResponse::from(&user)))
}

/// DELETE /api/v1/admin/users/:id: Remove an account with its dependents,
/// registrations and documents (files included).
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Would delete the caller", body = crate::error::ErrorBody),
        (status = 404, description = "User not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if id == admin.id {
        return Err(AppError::BadRequest("cannot delete your own account".to_string()));
    }
    let summary = state.db.delete_user(&id)?;
    state.persist(Change::Delete(Kind::Users, id)).await?;
    state.files.remove_all(summary.file_paths()).await;
    tracing::info!(user_id = %id, admin_id = %admin.id, removed = ?summary.removed, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Person handlers ─────────────────────────────────────────────────

/// GET /api/v1/admin/persons: Every dependent with its owner.
#[utoipa::path(
    get,
    path = "/api/v1/admin/persons",
    responses((status = 200, description = "Dependents", body = Vec<AdminPersonResponse>)),
    tag = "admin"
)]
async fn list_persons(State(state): State<AppState>, _admin: AdminUser) -> Json<Vec<AdminPersonResponse>> {
    let today = today();
    let persons = state.db.list_persons(None);
    let rows = state.db.read(|t| {
        persons
            .iter()
            .map(|p| AdminPersonResponse {
                person: PersonResponse::new(p, today),
                user_id: p.user_id,
                user_name: name_of(t, &p.user_id),
                user_national_id: t
                    .users
                    .get(&p.user_id)
                    .map(|u| u.national_id.to_string())
                    .unwrap_or_default(),
            })
            .collect()
    });
    Json(rows)
}

/// DELETE /api/v1/admin/persons/:id
#[utoipa::path(
    delete,
    path = "/api/v1/admin/persons/{id}",
    params(("id" = Uuid, Path, description = "Person ID")),
    responses(
        (status = 204, description = "Dependent deleted"),
        (status = 404, description = "Person not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_person(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_person(&id)?;
    state.persist(Change::Delete(Kind::Persons, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Registration handlers ───────────────────────────────────────────

/// GET /api/v1/admin/registrations: Most recent first, optionally by status.
#[utoipa::path(
    get,
    path = "/api/v1/admin/registrations",
    params(
        ("status" = Option<RegistrationStatus>, Query, description = "Only this status"),
        ("plan_id" = Option<Uuid>, Query, description = "Only this plan"),
        ("search" = Option<String>, Query, description = "Owner's national id, name or email fragment"),
    ),
    responses(
        (status = 200, description = "Registrations", body = Vec<AdminRegistrationResponse>),
        (status = 400, description = "Unknown status or malformed id", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn list_registrations(
    State(state): State<AppState>,
    _admin: AdminUser,
    query: Result<Query<RegistrationQuery>, QueryRejection>,
) -> Result<Json<Vec<AdminRegistrationResponse>>, AppError> {
    let q = extract_query(query)?;
    let regs = state.db.list_registrations(RegistrationFilter {
        user_id: None,
        status: q.status,
        plan_id: q.plan_id,
        search: q.search,
    });
    Ok(Json(state.db.read(|t| regs.iter().map(|r| summarize(t, r)).collect())))
}

/// GET /api/v1/admin/registrations/:id: Registration with account, plan,
/// school and covered dependents.
#[utoipa::path(
    get,
    path = "/api/v1/admin/registrations/{id}",
    params(("id" = Uuid, Path, description = "Registration ID")),
    responses(
        (status = 200, description = "Registration detail", body = AdminRegistrationDetail),
        (status = 404, description = "Registration not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn get_registration(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminRegistrationDetail>, AppError> {
    let today = today();
    let detail = state.db.read(|t| {
        let reg = t.registrations.get(&id)?;
        let user = t.users.get(&reg.user_id);
        let plan = t.plans.get(&reg.plan_id);
        let school = t.schools.get(&reg.school_id);
        Some(AdminRegistrationDetail {
            registration: RegistrationResponse::from(reg),
            user_name: user.map(User::full_name).unwrap_or_default(),
            user_email: user.and_then(|u| u.email.clone()),
            user_national_id: user.map(|u| u.national_id.to_string()).unwrap_or_default(),
            plan_name: plan.map(|p| p.name_fa.clone()).unwrap_or_default(),
            plan_type: plan.map(|p| p.plan_type),
            monthly_premium: plan.map(|p| p.monthly_premium),
            school_name: school.map(|s| s.name_fa.clone()).unwrap_or_default(),
            school_code: school.map(|s| s.code.clone()),
            persons: reg
                .person_ids
                .iter()
                .filter_map(|pid| t.persons.get(pid))
                .map(|p| PersonResponse::new(p, today))
                .collect(),
        })
    });
    detail
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("registration {id} not found")))
}

/// PUT /api/v1/admin/registrations/:id/status: Move a registration to any
/// status, optionally setting its coverage period.
#[utoipa::path(
    put,
    path = "/api/v1/admin/registrations/{id}/status",
    params(("id" = Uuid, Path, description = "Registration ID")),
    request_body = UpdateRegistrationStatusRequest,
    responses(
        (status = 200, description = "Registration updated", body = AdminRegistrationResponse),
        (status = 404, description = "Registration not found", body = crate::error::ErrorBody),
        (status = 409, description = "User would hold two open registrations", body = crate::error::ErrorBody),
        (status = 422, description = "start_date after end_date", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn update_registration_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateRegistrationStatusRequest>, JsonRejection>,
) -> Result<Json<AdminRegistrationResponse>, AppError> {
    let req = extract_json(body)?;
    let reg = state.db.update_registration(&id, |r| {
        r.status = req.status;
        if let Some(start) = req.start_date {
            r.start_date = Some(start);
        }
        if let Some(end) = req.end_date {
            r.end_date = Some(end);
        }
    })?;
    state.persist(Change::Registration(&reg)).await?;
    tracing::info!(registration_id = %id, admin_id = %admin.id, status = reg.status.as_str(), "registration status changed");
    Ok(Json(state.db.read(|t| summarize(t, &reg))))
}

/// DELETE /api/v1/admin/registrations/:id: Attached documents stay with
/// the user, unlinked.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/registrations/{id}",
    params(("id" = Uuid, Path, description = "Registration ID")),
    responses(
        (status = 204, description = "Registration deleted"),
        (status = 404, description = "Registration not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_registration(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_registration(&id)?;
    state.persist(Change::Delete(Kind::Registrations, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
