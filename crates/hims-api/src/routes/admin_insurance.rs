//! # Admin Insurance Catalogue API
//!
//! Plans are never deleted: `DELETE` withdraws a plan by clearing
//! `is_active`, so existing registrations keep their reference.
//!
//! ## Endpoints
//!
//! - `GET|POST /api/v1/admin/plans`, `PUT|DELETE /api/v1/admin/plans/:id`
//! - `GET|POST /api/v1/admin/coverages` (`?plan_id=&coverage_type=`),
//!   `PUT|DELETE /api/v1/admin/coverages/:id`

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use hims_core::insurance::{NewCoverage, NewPlan};
use hims_core::{CoverageType, PlanCoverage, PlanType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::insurance::{CoverageResponse, PlanResponse};
use crate::auth::AdminUser;
use crate::db::{Change, Kind};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// A plan with every coverage line, active or not.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminPlanResponse {
    #[serde(flatten)]
    pub plan: PlanResponse,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminCoverageResponse {
    #[serde(flatten)]
    pub coverage: CoverageResponse,
    pub plan_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&PlanCoverage> for AdminCoverageResponse {
    fn from(c: &PlanCoverage) -> Self {
        Self {
            coverage: CoverageResponse::from(c),
            plan_id: c.plan_id,
            is_active: c.is_active,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePlanRequest {
    pub name_fa: String,
    pub plan_type: PlanType,
    #[serde(default)]
    pub description_fa: String,
    /// Rials per month; must not be negative.
    pub monthly_premium: i64,
}

/// Absent fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePlanRequest {
    pub name_fa: Option<String>,
    pub plan_type: Option<PlanType>,
    pub description_fa: Option<String>,
    pub monthly_premium: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCoverageRequest {
    pub plan_id: Uuid,
    pub coverage_type: CoverageType,
    pub title_fa: String,
    #[serde(default)]
    pub description_fa: String,
    pub coverage_amount: i64,
    /// 0 to 100.
    pub coverage_percentage: i32,
    pub max_usage_count: Option<i32>,
}

/// Absent fields are left unchanged. The owning plan cannot be changed.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCoverageRequest {
    pub coverage_type: Option<CoverageType>,
    pub title_fa: Option<String>,
    pub description_fa: Option<String>,
    pub coverage_amount: Option<i64>,
    pub coverage_percentage: Option<i32>,
    pub max_usage_count: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CoverageFilter {
    pub plan_id: Option<Uuid>,
    pub coverage_type: Option<CoverageType>,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/plans", get(list_plans).post(create_plan))
        .route("/api/v1/admin/plans/:id", put(update_plan).delete(deactivate_plan))
        .route("/api/v1/admin/coverages", get(list_coverages).post(create_coverage))
        .route("/api/v1/admin/coverages/:id", put(update_coverage).delete(delete_coverage))
}

fn admin_plan(state: &AppState, plan: &hims_core::InsurancePlan) -> AdminPlanResponse {
    AdminPlanResponse {
        plan: PlanResponse::new(plan, &state.db.list_coverages(Some(plan.id))),
        created_at: plan.created_at,
        updated_at: plan.updated_at,
    }
}

// ── Plan handlers ───────────────────────────────────────────────────

/// GET /api/v1/admin/plans: Every plan, active or withdrawn.
#[utoipa::path(
    get,
    path = "/api/v1/admin/plans",
    responses((status = 200, description = "Plans", body = Vec<AdminPlanResponse>)),
    tag = "admin"
)]
async fn list_plans(State(state): State<AppState>, _admin: AdminUser) -> Json<Vec<AdminPlanResponse>> {
    Json(state.db.list_plans(false).iter().map(|p| admin_plan(&state, p)).collect())
}

/// POST /api/v1/admin/plans
#[utoipa::path(
    post,
    path = "/api/v1/admin/plans",
    request_body = CreatePlanRequest,
    responses(
        (status = 201, description = "Plan created", body = AdminPlanResponse),
        (status = 409, description = "Plan name already in use", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn create_plan(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    body: Result<Json<CreatePlanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdminPlanResponse>), AppError> {
    let req = extract_json(body)?;
    let plan = state.db.insert_plan(NewPlan {
        name_fa: req.name_fa,
        plan_type: req.plan_type,
        description_fa: req.description_fa,
        monthly_premium: req.monthly_premium,
    })?;
    state.persist(Change::Plan(&plan)).await?;
    tracing::info!(plan_id = %plan.id, admin_id = %admin.id, "plan created");
    Ok((StatusCode::CREATED, Json(admin_plan(&state, &plan))))
}

/// PUT /api/v1/admin/plans/:id
#[utoipa::path(
    put,
    path = "/api/v1/admin/plans/{id}",
    params(("id" = Uuid, Path, description = "Plan ID")),
    request_body = UpdatePlanRequest,
    responses(
        (status = 200, description = "Plan updated", body = AdminPlanResponse),
        (status = 404, description = "Plan not found", body = crate::error::ErrorBody),
        (status = 409, description = "Plan name already in use", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn update_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdatePlanRequest>, JsonRejection>,
) -> Result<Json<AdminPlanResponse>, AppError> {
    let req = extract_json(body)?;
    let plan = state.db.update_plan(&id, |p| {
        if let Some(name_fa) = req.name_fa {
            p.name_fa = name_fa;
        }
        if let Some(plan_type) = req.plan_type {
            p.plan_type = plan_type;
        }
        if let Some(description_fa) = req.description_fa {
            p.description_fa = description_fa;
        }
        if let Some(premium) = req.monthly_premium {
            p.monthly_premium = premium;
        }
        if let Some(active) = req.is_active {
            p.is_active = active;
        }
    })?;
    state.persist(Change::Plan(&plan)).await?;
    Ok(Json(admin_plan(&state, &plan)))
}

/// DELETE /api/v1/admin/plans/:id: Withdraw the plan.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/plans/{id}",
    params(("id" = Uuid, Path, description = "Plan ID")),
    responses(
        (status = 204, description = "Plan deactivated"),
        (status = 404, description = "Plan not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn deactivate_plan(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let plan = state.db.update_plan(&id, |p| p.is_active = false)?;
    state.persist(Change::Plan(&plan)).await?;
    tracing::info!(plan_id = %id, admin_id = %admin.id, "plan deactivated");
    Ok(StatusCode::NO_CONTENT)
}

// ── Coverage handlers ───────────────────────────────────────────────

/// GET /api/v1/admin/coverages: Optionally restricted to one plan.
#[utoipa::path(
    get,
    path = "/api/v1/admin/coverages",
    params(
        ("plan_id" = Option<Uuid>, Query, description = "Only this plan's lines"),
        ("coverage_type" = Option<CoverageType>, Query, description = "Only this kind of line"),
    ),
    responses(
        (status = 200, description = "Coverage lines", body = Vec<AdminCoverageResponse>),
        (status = 400, description = "Malformed plan_id or unknown coverage type", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn list_coverages(
    State(state): State<AppState>,
    _admin: AdminUser,
    query: Result<Query<CoverageFilter>, QueryRejection>,
) -> Result<Json<Vec<AdminCoverageResponse>>, AppError> {
    let q = extract_query(query)?;
    Ok(Json(
        state
            .db
            .list_coverages(q.plan_id)
            .iter()
            .filter(|c| q.coverage_type.map_or(true, |k| c.coverage_type == k))
            .map(AdminCoverageResponse::from)
            .collect(),
    ))
}

/// POST /api/v1/admin/coverages: One line per coverage type per plan.
#[utoipa::path(
    post,
    path = "/api/v1/admin/coverages",
    request_body = CreateCoverageRequest,
    responses(
        (status = 201, description = "Coverage created", body = AdminCoverageResponse),
        (status = 404, description = "Plan not found", body = crate::error::ErrorBody),
        (status = 409, description = "Plan already has this coverage type", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn create_coverage(
    State(state): State<AppState>,
    _admin: AdminUser,
    body: Result<Json<CreateCoverageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdminCoverageResponse>), AppError> {
    let req = extract_json(body)?;
    let coverage = state.db.insert_coverage(NewCoverage {
        plan_id: req.plan_id,
        coverage_type: req.coverage_type,
        title_fa: req.title_fa,
        description_fa: req.description_fa,
        coverage_amount: req.coverage_amount,
        coverage_percentage: req.coverage_percentage,
        max_usage_count: req.max_usage_count,
    })?;
    state.persist(Change::Coverage(&coverage)).await?;
    Ok((StatusCode::CREATED, Json(AdminCoverageResponse::from(&coverage))))
}

/// PUT /api/v1/admin/coverages/:id
#[utoipa::path(
    put,
    path = "/api/v1/admin/coverages/{id}",
    params(("id" = Uuid, Path, description = "Coverage ID")),
    request_body = UpdateCoverageRequest,
    responses(
        (status = 200, description = "Coverage updated", body = AdminCoverageResponse),
        (status = 404, description = "Coverage not found", body = crate::error::ErrorBody),
        (status = 409, description = "Plan already has this coverage type", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn update_coverage(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateCoverageRequest>, JsonRejection>,
) -> Result<Json<AdminCoverageResponse>, AppError> {
    let req = extract_json(body)?;
    let coverage = state.db.update_coverage(&id, |c| {
        if let Some(coverage_type) = req.coverage_type {
            c.coverage_type = coverage_type;
        }
        if let Some(title_fa) = req.title_fa {
            c.title_fa = title_fa;
        }
        if let Some(description_fa) = req.description_fa {
            c.description_fa = description_fa;
        }
        if let Some(amount) = req.coverage_amount {
            c.coverage_amount = amount;
        }
        if let Some(percentage) = req.coverage_percentage {
            c.coverage_percentage = percentage;
        }
        if let Some(max) = req.max_usage_count {
            c.max_usage_count = Some(max);
        }
        if let Some(active) = req.is_active {
            c.is_active = active;
        }
    })?;
    state.persist(Change::Coverage(&coverage)).await?;
    Ok(Json(AdminCoverageResponse::from(&coverage)))
}

/// DELETE /api/v1/admin/coverages/:id
#[utoipa::path(
    delete,
    path = "/api/v1/admin/coverages/{id}",
    params(("id" = Uuid, Path, description = "Coverage ID")),
    responses(
        (status = 204, description = "Coverage deleted"),
        (status = 404, description = "Coverage not found", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_coverage(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_coverage(&id)?;
    state.persist(Change::Delete(Kind::Coverages, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
