//! # Location Lookup API (public)
//!
//! Cascading reads used by registration forms. Every level below the state
//! requires its parent id; a missing or malformed one is a 400.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/locations/states`
//! - `GET /api/v1/locations/cities?state_id=`
//! - `GET /api/v1/locations/counties?city_id=`
//! - `GET /api/v1/locations/regions?county_id=`
//! - `GET /api/v1/locations/districts?region_id=`
//! - `GET /api/v1/locations/schools?district_id=`

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use hims_core::location::{CityTier, CountyTier, DistrictTier, RegionTier};
use hims_core::store::DivisionTable;
use hims_core::{Division, School, SchoolType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::AppState;

// ── Response DTOs ───────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StateResponse {
    pub id: Uuid,
    pub name_fa: String,
    pub code: String,
}

impl From<&hims_core::State> for StateResponse {
    fn from(s: &hims_core::State) -> Self {
        Self {
            id: s.id,
            name_fa: s.name_fa.clone(),
            code: s.code.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CityResponse {
    pub id: Uuid,
    pub state_id: Uuid,
    pub name_fa: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CountyResponse {
    pub id: Uuid,
    pub city_id: Uuid,
    pub name_fa: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegionResponse {
    pub id: Uuid,
    pub county_id: Uuid,
    pub name_fa: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DistrictResponse {
    pub id: Uuid,
    pub region_id: Uuid,
    pub name_fa: String,
    pub code: String,
}

/// Response shape of one intermediate level. The parent column is named
/// after the parent level (`state_id`, `city_id`, ...).
pub trait DivisionView: DivisionTable {
    type Response: Serialize + Send + 'static;

    fn response(row: &Division<Self>) -> Self::Response;
}

impl DivisionView for CityTier {
    type Response = CityResponse;

    fn response(d: &Division<Self>) -> CityResponse {
        CityResponse {
            id: d.id,
            state_id: d.parent_id,
            name_fa: d.name_fa.clone(),
            code: d.code.clone(),
        }
    }
}

impl DivisionView for CountyTier {
    type Response = CountyResponse;

    fn response(d: &Division<Self>) -> CountyResponse {
        CountyResponse {
            id: d.id,
            city_id: d.parent_id,
            name_fa: d.name_fa.clone(),
            code: d.code.clone(),
        }
    }
}

impl DivisionView for RegionTier {
    type Response = RegionResponse;

    fn response(d: &Division<Self>) -> RegionResponse {
        RegionResponse {
            id: d.id,
            county_id: d.parent_id,
            name_fa: d.name_fa.clone(),
            code: d.code.clone(),
        }
    }
}

impl DivisionView for DistrictTier {
    type Response = DistrictResponse;

    fn response(d: &Division<Self>) -> DistrictResponse {
        DistrictResponse {
            id: d.id,
            region_id: d.parent_id,
            name_fa: d.name_fa.clone(),
            code: d.code.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SchoolResponse {
    pub id: Uuid,
    pub district_id: Uuid,
    pub name_fa: String,
    pub code: String,
    pub school_type: SchoolType,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl From<&School> for SchoolResponse {
    fn from(s: &School) -> Self {
        Self {
            id: s.id,
            district_id: s.district_id,
            name_fa: s.name_fa.clone(),
            code: s.code.clone(),
            school_type: s.school_type,
            address: s.address.clone(),
            phone: s.phone.clone(),
        }
    }
}

// ── Query parameters ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StateFilter {
    pub state_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CityFilter {
    pub city_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CountyFilter {
    pub county_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RegionFilter {
    pub region_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DistrictFilter {
    pub district_id: Uuid,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/locations/states", get(list_states))
        .route("/api/v1/locations/cities", get(list_cities))
        .route("/api/v1/locations/counties", get(list_counties))
        .route("/api/v1/locations/regions", get(list_regions))
        .route("/api/v1/locations/districts", get(list_districts))
        .route("/api/v1/locations/schools", get(list_schools))
}

pub(crate) fn children<T: DivisionView>(state: &AppState, parent_id: Option<Uuid>) -> Vec<T::Response> {
    state
        .db
        .list_divisions::<T>(parent_id)
        .iter()
        .map(T::response)
        .collect()
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/locations/states: By display order, then name.
#[utoipa::path(
    get,
    path = "/api/v1/locations/states",
    responses((status = 200, description = "States", body = Vec<StateResponse>)),
    tag = "locations"
)]
async fn list_states(State(state): State<AppState>) -> Json<Vec<StateResponse>> {
    Json(state.db.list_states().iter().map(StateResponse::from).collect())
}

/// GET /api/v1/locations/cities?state_id=
#[utoipa::path(
    get,
    path = "/api/v1/locations/cities",
    params(("state_id" = Uuid, Query, description = "Parent state")),
    responses(
        (status = 200, description = "Cities of the state", body = Vec<CityResponse>),
        (status = 400, description = "Missing or malformed state_id", body = crate::error::ErrorBody),
    ),
    tag = "locations"
)]
async fn list_cities(
    State(state): State<AppState>,
    query: Result<Query<StateFilter>, QueryRejection>,
) -> Result<Json<Vec<CityResponse>>, AppError> {
    let q = extract_query(query)?;
    Ok(Json(children::<CityTier>(&state, Some(q.state_id))))
}

/// GET /api/v1/locations/counties?city_id=
#[utoipa::path(
    get,
    path = "/api/v1/locations/counties",
    params(("city_id" = Uuid, Query, description = "Parent city")),
    responses(
        (status = 200, description = "Counties of the city", body = Vec<CountyResponse>),
        (status = 400, description = "Missing or malformed city_id", body = crate::error::ErrorBody),
    ),
    tag = "locations"
)]
async fn list_counties(
    State(state): State<AppState>,
    query: Result<Query<CityFilter>, QueryRejection>,
) -> Result<Json<Vec<CountyResponse>>, AppError> {
    let q = extract_query(query)?;
    Ok(Json(children::<CountyTier>(&state, Some(q.city_id))))
}

/// GET /api/v1/locations/regions?county_id=
#[utoipa::path(
    get,
    path = "/api/v1/locations/regions",
    params(("county_id" = Uuid, Query, description = "Parent county")),
    responses(
        (status = 200, description = "Regions of the county", body = Vec<RegionResponse>),
        (status = 400, description = "Missing or malformed county_id", body = crate::error::ErrorBody),
    ),
    tag = "locations"
)]
async fn list_regions(
    State(state): State<AppState>,
    query: Result<Query<CountyFilter>, QueryRejection>,
) -> Result<Json<Vec<RegionResponse>>, AppError> {
    let q = extract_query(query)?;
    Ok(Json(children::<RegionTier>(&state, Some(q.county_id))))
}

/// GET /api/v1/locations/districts?region_id=
#[utoipa::path(
    get,
    path = "/api/v1/locations/districts",
    params(("region_id" = Uuid, Query, description = "Parent region")),
    responses(
        (status = 200, description = "Districts of the region", body = Vec<DistrictResponse>),
        (status = 400, description = "Missing or malformed region_id", body = crate::error::ErrorBody),
    ),
    tag = "locations"
)]
async fn list_districts(
    State(state): State<AppState>,
    query: Result<Query<RegionFilter>, QueryRejection>,
) -> Result<Json<Vec<DistrictResponse>>, AppError> {
    let q = extract_query(query)?;
    Ok(Json(children::<DistrictTier>(&state, Some(q.region_id))))
}

/// GET /api/v1/locations/schools?district_id=
#[utoipa::path(
    get,
    path = "/api/v1/locations/schools",
    params(("district_id" = Uuid, Query, description = "Parent district")),
    responses(
        (status = 200, description = "Schools of the district", body = Vec<SchoolResponse>),
        (status = 400, description = "Missing or malformed district_id", body = crate::error::ErrorBody),
    ),
    tag = "locations"
)]
async fn list_schools(
    State(state): State<AppState>,
    query: Result<Query<DistrictFilter>, QueryRejection>,
) -> Result<Json<Vec<SchoolResponse>>, AppError> {
    let q = extract_query(query)?;
    Ok(Json(
        state
            .db
            .list_schools(Some(q.district_id))
            .iter()
            .map(SchoolResponse::from)
            .collect(),
    ))
}
