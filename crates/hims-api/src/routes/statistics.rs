//! # Statistics API
//!
//! Thin wrappers over the aggregate functions in [`hims_core::stats`]. Each
//! request computes its figures from one consistent read of the tables.
//!
//! ## Endpoints
//!
//! Admin: `GET /api/v1/statistics/admin/{overview,registrations,persons,
//! schools,plans,users,dashboard}`.
//!
//! Caller: `GET /api/v1/statistics/user/{overview,registrations,persons}`.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use hims_core::stats::{
    self, DashboardStats, OverviewStats, PersonStats, PlanStats, RegistrationStats, SchoolStats, UserOverviewStats,
    UserPersonStats, UserRegistrationStats, UserStats,
};

use super::today;
use crate::auth::{AdminUser, CurrentUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/statistics/admin/overview", get(admin_overview))
        .route("/api/v1/statistics/admin/registrations", get(admin_registrations))
        .route("/api/v1/statistics/admin/persons", get(admin_persons))
        .route("/api/v1/statistics/admin/schools", get(admin_schools))
        .route("/api/v1/statistics/admin/plans", get(admin_plans))
        .route("/api/v1/statistics/admin/users", get(admin_users))
        .route("/api/v1/statistics/admin/dashboard", get(admin_dashboard))
        .route("/api/v1/statistics/user/overview", get(user_overview))
        .route("/api/v1/statistics/user/registrations", get(user_registrations))
        .route("/api/v1/statistics/user/persons", get(user_persons))
}

// ── Admin ───────────────────────────────────────────────────────────

/// GET /api/v1/statistics/admin/overview: Headline counts.
#[utoipa::path(
    get,
    path = "/api/v1/statistics/admin/overview",
    responses((status = 200, description = "System overview", body = OverviewStats)),
    tag = "statistics"
)]
async fn admin_overview(State(state): State<AppState>, _admin: AdminUser) -> Json<OverviewStats> {
    Json(state.db.read(stats::overview))
}

/// GET /api/v1/statistics/admin/registrations: Status breakdown, per-plan
/// counts and the monthly trend.
#[utoipa::path(
    get,
    path = "/api/v1/statistics/admin/registrations",
    responses((status = 200, description = "Registration statistics", body = RegistrationStats)),
    tag = "statistics"
)]
async fn admin_registrations(State(state): State<AppState>, _admin: AdminUser) -> Json<RegistrationStats> {
    let now = Utc::now();
    Json(state.db.read(|t| stats::registrations(t, now)))
}

/// GET /api/v1/statistics/admin/persons
#[utoipa::path(
    get,
    path = "/api/v1/statistics/admin/persons",
    responses((status = 200, description = "Dependent statistics", body = PersonStats)),
    tag = "statistics"
)]
async fn admin_persons(State(state): State<AppState>, _admin: AdminUser) -> Json<PersonStats> {
    let today = today();
    Json(state.db.read(|t| stats::persons(t, today)))
}

/// GET /api/v1/statistics/admin/schools
#[utoipa::path(
    get,
    path = "/api/v1/statistics/admin/schools",
    responses((status = 200, description = "School statistics", body = SchoolStats)),
    tag = "statistics"
)]
async fn admin_schools(State(state): State<AppState>, _admin: AdminUser) -> Json<SchoolStats> {
    Json(state.db.read(stats::schools))
}

/// GET /api/v1/statistics/admin/plans
#[utoipa::path(
    get,
    path = "/api/v1/statistics/admin/plans",
    responses((status = 200, description = "Plan statistics", body = PlanStats)),
    tag = "statistics"
)]
async fn admin_plans(State(state): State<AppState>, _admin: AdminUser) -> Json<PlanStats> {
    Json(state.db.read(stats::plans))
}

/// GET /api/v1/statistics/admin/users
#[utoipa::path(
    get,
    path = "/api/v1/statistics/admin/users",
    responses((status = 200, description = "Account statistics", body = UserStats)),
    tag = "statistics"
)]
async fn admin_users(State(state): State<AppState>, _admin: AdminUser) -> Json<UserStats> {
    let now = Utc::now();
    Json(state.db.read(|t| stats::users(t, now)))
}

/// GET /api/v1/statistics/admin/dashboard: Every admin section at once.
#[utoipa::path(
    get,
    path = "/api/v1/statistics/admin/dashboard",
    responses((status = 200, description = "All admin statistics", body = DashboardStats)),
    tag = "statistics"
)]
async fn admin_dashboard(State(state): State<AppState>, _admin: AdminUser) -> Json<DashboardStats> {
    let now = Utc::now();
    Json(state.db.read(|t| stats::dashboard(t, now)))
}

// ── Caller ──────────────────────────────────────────────────────────

/// GET /api/v1/statistics/user/overview
#[utoipa::path(
    get,
    path = "/api/v1/statistics/user/overview",
    responses((status = 200, description = "Caller's overview", body = UserOverviewStats)),
    tag = "statistics"
)]
async fn user_overview(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Json<UserOverviewStats> {
    Json(state.db.read(|t| stats::user_overview(t, &user)))
}

/// GET /api/v1/statistics/user/registrations
#[utoipa::path(
    get,
    path = "/api/v1/statistics/user/registrations",
    responses((status = 200, description = "Caller's registrations by status", body = UserRegistrationStats)),
    tag = "statistics"
)]
async fn user_registrations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<UserRegistrationStats> {
    Json(state.db.read(|t| stats::user_registrations(t, user.id)))
}

/// GET /api/v1/statistics/user/persons
#[utoipa::path(
    get,
    path = "/api/v1/statistics/user/persons",
    responses((status = 200, description = "Caller's dependents by relation and age", body = UserPersonStats)),
    tag = "statistics"
)]
async fn user_persons(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Json<UserPersonStats> {
    let today = today();
    Json(state.db.read(|t| stats::user_persons(t, user.id, today)))
}
