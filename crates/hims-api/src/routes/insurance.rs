//! # Insurance API
//!
//! ## Endpoints
//!
//! - `GET /api/v1/insurance/plans`: active plans with active coverages (public)
//! - `GET /api/v1/insurance/plans/:id`: one active plan (public)
//! - `POST /api/v1/insurance/register`: enrol the caller
//! - `GET /api/v1/insurance/registrations`: the caller's registrations
//! - `GET /api/v1/insurance/registrations/:id`: one of them

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use hims_core::insurance::NewRegistration;
use hims_core::store::RegistrationFilter;
use hims_core::{CoverageType, InsurancePlan, InsuranceRegistration, PlanCoverage, PlanType, RegistrationStatus};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::Change;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CoverageResponse {
    pub id: Uuid,
    pub coverage_type: CoverageType,
    pub coverage_type_display: String,
    pub title_fa: String,
    pub description_fa: String,
    /// Ceiling in rials.
    pub coverage_amount: i64,
    pub coverage_percentage: i32,
    pub max_usage_count: Option<i32>,
}

impl From<&PlanCoverage> for CoverageResponse {
    fn from(c: &PlanCoverage) -> Self {
        Self {
            id: c.id,
            coverage_type: c.coverage_type,
            coverage_type_display: c.coverage_type.label_fa().to_string(),
            title_fa: c.title_fa.clone(),
            description_fa: c.description_fa.clone(),
            coverage_amount: c.coverage_amount,
            coverage_percentage: c.coverage_percentage,
            max_usage_count: c.max_usage_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlanResponse {
    pub id: Uuid,
    pub name_fa: String,
    pub plan_type: PlanType,
    pub plan_type_display: String,
    pub description_fa: String,
    /// Rials per month.
    pub monthly_premium: i64,
    pub is_active: bool,
    pub coverages: Vec<CoverageResponse>,
}

impl PlanResponse {
    /// `coverages` is expected to be pre-filtered by the caller.
    pub fn new(plan: &InsurancePlan, coverages: &[PlanCoverage]) -> Self {
        Self {
            id: plan.id,
            name_fa: plan.name_fa.clone(),
            plan_type: plan.plan_type,
            plan_type_display: plan.plan_type.label_fa().to_string(),
            description_fa: plan.description_fa.clone(),
            monthly_premium: plan.monthly_premium,
            is_active: plan.is_active,
            coverages: coverages.iter().map(CoverageResponse::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterInsuranceRequest {
    pub plan_id: Uuid,
    pub school_id: Uuid,
    /// Dependents to cover; each must belong to the caller.
    #[serde(default)]
    pub person_ids: Vec<Uuid>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub additional_info: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegistrationResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub school_id: Uuid,
    pub person_ids: Vec<Uuid>,
    pub status: RegistrationStatus,
    pub status_display: String,
    pub registration_date: DateTime<Utc>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[schema(value_type = Object)]
    pub additional_info: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl From<&InsuranceRegistration> for RegistrationResponse {
    fn from(r: &InsuranceRegistration) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            plan_id: r.plan_id,
            school_id: r.school_id,
            person_ids: r.person_ids.clone(),
            status: r.status,
            status_display: r.status.label_fa().to_string(),
            registration_date: r.registration_date,
            start_date: r.start_date,
            end_date: r.end_date,
            additional_info: r.additional_info.clone(),
            updated_at: r.updated_at,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/insurance/plans", get(list_plans))
        .route("/api/v1/insurance/plans/:id", get(get_plan))
        .route("/api/v1/insurance/register", post(register))
        .route("/api/v1/insurance/registrations", get(list_registrations))
        .route("/api/v1/insurance/registrations/:id", get(get_registration))
}

fn active_coverages(state: &AppState, plan_id: Uuid) -> Vec<PlanCoverage> {
    state
        .db
        .list_coverages(Some(plan_id))
        .into_iter()
        .filter(|c| c.is_active)
        .collect()
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/insurance/plans: Active plans, each with its active
/// coverage lines.
#[utoipa::path(
    get,
    path = "/api/v1/insurance/plans",
    responses((status = 200, description = "Active plans", body = Vec<PlanResponse>)),
    tag = "insurance"
)]
async fn list_plans(State(state): State<AppState>) -> Json<Vec<PlanResponse>> {
    Json(
        state
            .db
            .list_plans(true)
            .iter()
            .map(|p| PlanResponse::new(p, &active_coverages(&state, p.id)))
            .collect(),
    )
}

/// GET /api/v1/insurance/plans/:id: Inactive plans are not found.
#[utoipa::path(
    get,
    path = "/api/v1/insurance/plans/{id}",
    params(("id" = Uuid, Path, description = "Plan ID")),
    responses(
        (status = 200, description = "Plan", body = PlanResponse),
        (status = 404, description = "Unknown or inactive plan", body = crate::error::ErrorBody),
    ),
    tag = "insurance"
)]
async fn get_plan(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<PlanResponse>, AppError> {
    let plan = state
        .db
        .get_plan(&id)
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("plan {id} not found")))?;
    Ok(Json(PlanResponse::new(&plan, &active_coverages(&state, id))))
}

/// POST /api/v1/insurance/register: Enrol the caller. A user holds at
/// most one pending, approved or active registration.
#[utoipa::path(
    post,
    path = "/api/v1/insurance/register",
    request_body = RegisterInsuranceRequest,
    responses(
        (status = 201, description = "Registration submitted", body = RegistrationResponse),
        (status = 404, description = "Plan inactive or unknown, school unknown, or a person not the caller's", body = crate::error::ErrorBody),
        (status = 409, description = "Caller already has an open registration", body = crate::error::ErrorBody),
    ),
    tag = "insurance"
)]
async fn register(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<RegisterInsuranceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let req = extract_json(body)?;
    let reg = state.db.insert_registration(NewRegistration {
        user_id: user.id,
        plan_id: req.plan_id,
        school_id: req.school_id,
        person_ids: req.person_ids,
        additional_info: req.additional_info.unwrap_or_else(|| serde_json::json!({})),
    })?;
    state.persist(Change::Registration(&reg)).await?;
    tracing::info!(registration_id = %reg.id, user_id = %user.id, plan_id = %reg.plan_id, "registration submitted");
    Ok((StatusCode::CREATED, Json(RegistrationResponse::from(&reg))))
}

/// GET /api/v1/insurance/registrations: The caller's, most recent first.
#[utoipa::path(
    get,
    path = "/api/v1/insurance/registrations",
    responses((status = 200, description = "Registrations", body = Vec<RegistrationResponse>)),
    tag = "insurance"
)]
async fn list_registrations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<RegistrationResponse>> {
    let filter = RegistrationFilter {
        user_id: Some(user.id),
        ..Default::default()
    };
    Json(
        state
            .db
            .list_registrations(filter)
            .iter()
            .map(RegistrationResponse::from)
            .collect(),
    )
}

/// GET /api/v1/insurance/registrations/:id
#[utoipa::path(
    get,
    path = "/api/v1/insurance/registrations/{id}",
    params(("id" = Uuid, Path, description = "Registration ID")),
    responses(
        (status = 200, description = "Registration", body = RegistrationResponse),
        (status = 404, description = "Not found or not the caller's", body = crate::error::ErrorBody),
    ),
    tag = "insurance"
)]
async fn get_registration(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RegistrationResponse>, AppError> {
    let reg = state
        .db
        .get_registration(&id)
        .filter(|r| r.user_id == user.id)
        .ok_or_else(|| AppError::NotFound(format!("registration {id} not found")))?;
    Ok(Json(RegistrationResponse::from(&reg)))
}
