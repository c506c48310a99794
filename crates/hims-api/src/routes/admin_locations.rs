//! # Admin Location Hierarchy API
//!
//! Deleting a state or an intermediate level removes its whole subtree.
//! Any delete that would remove a school still referenced by a
//! registration is refused with 409.
//!
//! ## Endpoints
//!
//! - `GET|POST /api/v1/admin/states`, `PUT|DELETE /api/v1/admin/states/:id`
//! - `GET|POST /api/v1/admin/{cities,counties,regions,districts}`
//!   (`?parent_id=` or the level's own parent name, e.g. `?state_id=`),
//!   `PUT|DELETE .../:id`
//! - `GET|POST /api/v1/admin/schools`
//!   (`?district_id=&state_id=&school_type=&search=`),
//!   `PUT|DELETE /api/v1/admin/schools/:id`

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use hims_core::location::{CityTier, CountyTier, DistrictTier, NewDivision, NewSchool, NewState, RegionTier};
use hims_core::store::SchoolFilter;
use hims_core::{Division, School, SchoolType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::locations::{DivisionView, SchoolResponse, StateResponse};
use crate::auth::AdminUser;
use crate::db::{Change, Kind};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminStateResponse {
    #[serde(flatten)]
    pub state: StateResponse,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}

impl From<&hims_core::State> for AdminStateResponse {
    fn from(s: &hims_core::State) -> Self {
        Self {
            state: StateResponse::from(s),
            order_index: s.order_index,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateStateRequest {
    pub name_fa: String,
    pub code: String,
    #[serde(default)]
    pub order_index: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStateRequest {
    pub name_fa: Option<String>,
    pub code: Option<String>,
    pub order_index: Option<i32>,
}

/// A city, county, region or district row plus its timestamp.
#[derive(Debug, Serialize)]
pub struct AdminDivisionResponse<R> {
    #[serde(flatten)]
    pub row: R,
    pub created_at: DateTime<Utc>,
}

/// Body for creating an intermediate level. The parent may be sent as
/// `parent_id` or under the parent level's own name.
#[derive(Debug, Deserialize)]
pub struct CreateDivisionRequest {
    #[serde(alias = "state_id", alias = "city_id", alias = "county_id", alias = "region_id")]
    pub parent_id: Uuid,
    pub name_fa: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDivisionRequest {
    #[serde(default, alias = "state_id", alias = "city_id", alias = "county_id", alias = "region_id")]
    pub parent_id: Option<Uuid>,
    pub name_fa: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ParentFilter {
    #[serde(default, alias = "state_id", alias = "city_id", alias = "county_id", alias = "region_id")]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminSchoolResponse {
    #[serde(flatten)]
    pub school: SchoolResponse,
    pub created_at: DateTime<Utc>,
}

impl From<&School> for AdminSchoolResponse {
    fn from(s: &School) -> Self {
        Self {
            school: SchoolResponse::from(s),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSchoolRequest {
    pub district_id: Uuid,
    pub name_fa: String,
    /// Unique across all schools.
    pub code: String,
    pub school_type: SchoolType,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSchoolRequest {
    pub district_id: Option<Uuid>,
    pub name_fa: Option<String>,
    pub code: Option<String>,
    pub school_type: Option<SchoolType>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SchoolQuery {
    pub district_id: Option<Uuid>,
    pub state_id: Option<Uuid>,
    pub school_type: Option<SchoolType>,
    /// Name, code, address or phone fragment.
    pub search: Option<String>,
}

// ── Division persistence ────────────────────────────────────────────

/// Write-through for one intermediate level.
pub trait AdminDivision: DivisionView {
    const KIND: Kind;

    fn change(row: &Division<Self>) -> Change<'_>;
}

impl AdminDivision for CityTier {
    const KIND: Kind = Kind::Cities;

    fn change(row: &Division<Self>) -> Change<'_> {
        Change::City(row)
    }
}

impl AdminDivision for CountyTier {
    const KIND: Kind = Kind::Counties;

    fn change(row: &Division<Self>) -> Change<'_> {
        Change::County(row)
    }
}

impl AdminDivision for RegionTier {
    const KIND: Kind = Kind::Regions;

    fn change(row: &Division<Self>) -> Change<'_> {
        Change::Region(row)
    }
}

impl AdminDivision for DistrictTier {
    const KIND: Kind = Kind::Districts;

    fn change(row: &Division<Self>) -> Change<'_> {
        Change::District(row)
    }
}

fn admin_division<T: AdminDivision>(row: &Division<T>) -> AdminDivisionResponse<T::Response> {
    AdminDivisionResponse {
        row: T::response(row),
        created_at: row.created_at,
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/states", get(list_states).post(create_state))
        .route("/api/v1/admin/states/:id", put(update_state).delete(delete_state))
        .merge(division_routes::<CityTier>())
        .merge(division_routes::<CountyTier>())
        .merge(division_routes::<RegionTier>())
        .merge(division_routes::<DistrictTier>())
        .route("/api/v1/admin/schools", get(list_schools).post(create_school))
        .route("/api/v1/admin/schools/:id", put(update_school).delete(delete_school))
}

fn division_routes<T: AdminDivision>() -> Router<AppState> {
    let collection = format!("/api/v1/admin/{}", T::TABLE);
    let item = format!("{collection}/:id");
    Router::new()
        .route(&collection, get(list_divisions::<T>).post(create_division::<T>))
        .route(&item, put(update_division::<T>).delete(delete_division::<T>))
}

// ── State handlers ──────────────────────────────────────────────────

/// GET /api/v1/admin/states
#[utoipa::path(
    get,
    path = "/api/v1/admin/states",
    responses((status = 200, description = "States", body = Vec<AdminStateResponse>)),
    tag = "admin"
)]
async fn list_states(State(state): State<AppState>, _admin: AdminUser) -> Json<Vec<AdminStateResponse>> {
    Json(state.db.list_states().iter().map(AdminStateResponse::from).collect())
}

/// POST /api/v1/admin/states
#[utoipa::path(
    post,
    path = "/api/v1/admin/states",
    request_body = CreateStateRequest,
    responses(
        (status = 201, description = "State created", body = AdminStateResponse),
        (status = 409, description = "Name or code already in use", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn create_state(
    State(state): State<AppState>,
    _admin: AdminUser,
    body: Result<Json<CreateStateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdminStateResponse>), AppError> {
    let req = extract_json(body)?;
    let row = state.db.insert_state(NewState {
        name_fa: req.name_fa,
        code: req.code,
        order_index: req.order_index,
    })?;
    state.persist(Change::State(&row)).await?;
    Ok((StatusCode::CREATED, Json(AdminStateResponse::from(&row))))
}

/// PUT /api/v1/admin/states/:id
#[utoipa::path(
    put,
    path = "/api/v1/admin/states/{id}",
    params(("id" = Uuid, Path, description = "State ID")),
    request_body = UpdateStateRequest,
    responses(
        (status = 200, description = "State updated", body = AdminStateResponse),
        (status = 404, description = "State not found", body = crate::error::ErrorBody),
        (status = 409, description = "Name or code already in use", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn update_state(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateStateRequest>, JsonRejection>,
) -> Result<Json<AdminStateResponse>, AppError> {
    let req = extract_json(body)?;
    let row = state.db.update_state(&id, |s| {
        if let Some(name_fa) = req.name_fa {
            s.name_fa = name_fa;
        }
        if let Some(code) = req.code {
            s.code = code;
        }
        if let Some(order_index) = req.order_index {
            s.order_index = order_index;
        }
    })?;
    state.persist(Change::State(&row)).await?;
    Ok(Json(AdminStateResponse::from(&row)))
}

/// DELETE /api/v1/admin/states/:id: Removes the whole subtree.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/states/{id}",
    params(("id" = Uuid, Path, description = "State ID")),
    responses(
        (status = 204, description = "State and subtree deleted"),
        (status = 404, description = "State not found", body = crate::error::ErrorBody),
        (status = 409, description = "A school below is still registered", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_state(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let summary = state.db.delete_state(&id)?;
    state.persist(Change::Delete(Kind::States, id)).await?;
    tracing::info!(state_id = %id, admin_id = %admin.id, removed = ?summary.removed, "state deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Division handlers ───────────────────────────────────────────────

async fn list_divisions<T: AdminDivision>(
    State(state): State<AppState>,
    _admin: AdminUser,
    query: Result<Query<ParentFilter>, QueryRejection>,
) -> Result<Json<Vec<AdminDivisionResponse<T::Response>>>, AppError> {
    let q = extract_query(query)?;
    Ok(Json(
        state
            .db
            .list_divisions::<T>(q.parent_id)
            .iter()
            .map(admin_division::<T>)
            .collect(),
    ))
}

async fn create_division<T: AdminDivision>(
    State(state): State<AppState>,
    _admin: AdminUser,
    body: Result<Json<CreateDivisionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdminDivisionResponse<T::Response>>), AppError> {
    let req = extract_json(body)?;
    let row = state.db.insert_division::<T>(NewDivision {
        parent_id: req.parent_id,
        name_fa: req.name_fa,
        code: req.code,
    })?;
    state.persist(T::change(&row)).await?;
    Ok((StatusCode::CREATED, Json(admin_division::<T>(&row))))
}

async fn update_division<T: AdminDivision>(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateDivisionRequest>, JsonRejection>,
) -> Result<Json<AdminDivisionResponse<T::Response>>, AppError> {
    let req = extract_json(body)?;
    let row = state.db.update_division::<T>(&id, |d| {
        if let Some(parent_id) = req.parent_id {
            d.parent_id = parent_id;
        }
        if let Some(name_fa) = req.name_fa {
            d.name_fa = name_fa;
        }
        if let Some(code) = req.code {
            d.code = code;
        }
    })?;
    state.persist(T::change(&row)).await?;
    Ok(Json(admin_division::<T>(&row)))
}

async fn delete_division<T: AdminDivision>(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let summary = state.db.delete_division::<T>(&id)?;
    state.persist(Change::Delete(T::KIND, id)).await?;
    tracing::info!(table = T::TABLE, id = %id, admin_id = %admin.id, removed = ?summary.removed, "division deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── School handlers ─────────────────────────────────────────────────

/// GET /api/v1/admin/schools
#[utoipa::path(
    get,
    path = "/api/v1/admin/schools",
    params(
        ("district_id" = Option<Uuid>, Query, description = "Only this district's schools"),
        ("state_id" = Option<Uuid>, Query, description = "Only schools in this province"),
        ("school_type" = Option<SchoolType>, Query, description = "Only this school type"),
        ("search" = Option<String>, Query, description = "Name, code, address or phone fragment"),
    ),
    responses(
        (status = 200, description = "Schools", body = Vec<AdminSchoolResponse>),
        (status = 400, description = "Malformed id or unknown school type", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn list_schools(
    State(state): State<AppState>,
    _admin: AdminUser,
    query: Result<Query<SchoolQuery>, QueryRejection>,
) -> Result<Json<Vec<AdminSchoolResponse>>, AppError> {
    let q = extract_query(query)?;
    let filter = SchoolFilter {
        district_id: q.district_id,
        state_id: q.state_id,
        school_type: q.school_type,
        search: q.search,
    };
    Ok(Json(
        state
            .db
            .search_schools(&filter)
            .iter()
            .map(AdminSchoolResponse::from)
            .collect(),
    ))
}

/// POST /api/v1/admin/schools
#[utoipa::path(
    post,
    path = "/api/v1/admin/schools",
    request_body = CreateSchoolRequest,
    responses(
        (status = 201, description = "School created", body = AdminSchoolResponse),
        (status = 404, description = "District not found", body = crate::error::ErrorBody),
        (status = 409, description = "School code already in use", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn create_school(
    State(state): State<AppState>,
    _admin: AdminUser,
    body: Result<Json<CreateSchoolRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AdminSchoolResponse>), AppError> {
    let req = extract_json(body)?;
    let school = state.db.insert_school(NewSchool {
        district_id: req.district_id,
        name_fa: req.name_fa,
        code: req.code,
        school_type: req.school_type,
        address: req.address,
        phone: req.phone,
    })?;
    state.persist(Change::School(&school)).await?;
    Ok((StatusCode::CREATED, Json(AdminSchoolResponse::from(&school))))
}

/// PUT /api/v1/admin/schools/:id
#[utoipa::path(
    put,
    path = "/api/v1/admin/schools/{id}",
    params(("id" = Uuid, Path, description = "School ID")),
    request_body = UpdateSchoolRequest,
    responses(
        (status = 200, description = "School updated", body = AdminSchoolResponse),
        (status = 404, description = "School or district not found", body = crate::error::ErrorBody),
        (status = 409, description = "School code already in use", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn update_school(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateSchoolRequest>, JsonRejection>,
) -> Result<Json<AdminSchoolResponse>, AppError> {
    let req = extract_json(body)?;
    let school = state.db.update_school(&id, |s| {
        if let Some(district_id) = req.district_id {
            s.district_id = district_id;
        }
        if let Some(name_fa) = req.name_fa {
            s.name_fa = name_fa;
        }
        if let Some(code) = req.code {
            s.code = code;
        }
        if let Some(school_type) = req.school_type {
            s.school_type = school_type;
        }
        if let Some(address) = req.address {
            s.address = Some(address);
        }
        if let Some(phone) = req.phone {
            s.phone = Some(phone);
        }
    })?;
    state.persist(Change::School(&school)).await?;
    Ok(Json(AdminSchoolResponse::from(&school)))
}

/// DELETE /api/v1/admin/schools/:id: Refused while registrations use it.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/schools/{id}",
    params(("id" = Uuid, Path, description = "School ID")),
    responses(
        (status = 204, description = "School deleted"),
        (status = 404, description = "School not found", body = crate::error::ErrorBody),
        (status = 409, description = "School is referenced by registrations", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn delete_school(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_school(&id)?;
    state.persist(Change::Delete(Kind::Schools, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
