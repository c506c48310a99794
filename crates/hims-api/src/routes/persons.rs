//! # Dependents API
//!
//! A caller only ever sees their own dependents; anyone else's are
//! reported as not found.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/persons`: list (newest first)
//! - `POST /api/v1/persons`: create
//! - `GET /api/v1/persons/:id`: get
//! - `PUT /api/v1/persons/:id`: partial update
//! - `DELETE /api/v1/persons/:id`: delete

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use hims_core::user::NewPerson;
use hims_core::{NationalId, Person, Relation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::today;
use crate::auth::CurrentUser;
use crate::db::{Change, Kind};
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PersonResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub national_code: String,
    pub birth_date: NaiveDate,
    pub relation: Relation,
    /// Persian label of `relation`.
    pub relation_display: String,
    /// Whole years as of today.
    pub age: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonResponse {
    pub fn new(p: &Person, today: NaiveDate) -> Self {
        Self {
            id: p.id,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            national_code: p.national_code.to_string(),
            birth_date: p.birth_date,
            relation: p.relation,
            relation_display: p.relation.label_fa().to_string(),
            age: p.age_on(today),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePersonRequest {
    pub first_name: String,
    pub last_name: String,
    /// Ten digits, unique among the caller's dependents.
    pub national_code: String,
    pub birth_date: NaiveDate,
    pub relation: Relation,
}

/// Absent fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePersonRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub national_code: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub relation: Option<Relation>,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/persons", get(list_persons).post(create_person))
        .route(
            "/api/v1/persons/:id",
            get(get_person).put(update_person).delete(delete_person),
        )
}

/// The caller's dependent `id`, or 404.
fn owned_person(state: &AppState, owner: Uuid, id: Uuid) -> Result<Person, AppError> {
    state
        .db
        .get_person(&id)
        .filter(|p| p.user_id == owner)
        .ok_or_else(|| AppError::NotFound(format!("person {id} not found")))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/v1/persons: The caller's dependents, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/persons",
    responses((status = 200, description = "Dependents", body = Vec<PersonResponse>)),
    tag = "persons"
)]
async fn list_persons(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Json<Vec<PersonResponse>> {
    let today = today();
    Json(
        state
            .db
            .list_persons(Some(user.id))
            .iter()
            .map(|p| PersonResponse::new(p, today))
            .collect(),
    )
}

/// POST /api/v1/persons: Add a dependent.
#[utoipa::path(
    post,
    path = "/api/v1/persons",
    request_body = CreatePersonRequest,
    responses(
        (status = 201, description = "Dependent created", body = PersonResponse),
        (status = 409, description = "National code already registered for this user", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "persons"
)]
async fn create_person(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreatePersonRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PersonResponse>), AppError> {
    let req = extract_json(body)?;
    let person = state.db.insert_person(NewPerson {
        user_id: user.id,
        first_name: req.first_name,
        last_name: req.last_name,
        national_code: NationalId::new(req.national_code)?,
        birth_date: req.birth_date,
        relation: req.relation,
    })?;
    state.persist(Change::Person(&person)).await?;
    Ok((StatusCode::CREATED, Json(PersonResponse::new(&person, today()))))
}

/// GET /api/v1/persons/:id
#[utoipa::path(
    get,
    path = "/api/v1/persons/{id}",
    params(("id" = Uuid, Path, description = "Person ID")),
    responses(
        (status = 200, description = "Dependent", body = PersonResponse),
        (status = 404, description = "Not found or not the caller's", body = crate::error::ErrorBody),
    ),
    tag = "persons"
)]
async fn get_person(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PersonResponse>, AppError> {
    let person = owned_person(&state, user.id, id)?;
    Ok(Json(PersonResponse::new(&person, today())))
}

/// PUT /api/v1/persons/:id
#[utoipa::path(
    put,
    path = "/api/v1/persons/{id}",
    params(("id" = Uuid, Path, description = "Person ID")),
    request_body = UpdatePersonRequest,
    responses(
        (status = 200, description = "Dependent updated", body = PersonResponse),
        (status = 404, description = "Not found or not the caller's", body = crate::error::ErrorBody),
        (status = 409, description = "National code already registered for this user", body = crate::error::ErrorBody),
    ),
    tag = "persons"
)]
async fn update_person(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdatePersonRequest>, JsonRejection>,
) -> Result<Json<PersonResponse>, AppError> {
    let req = extract_json(body)?;
    owned_person(&state, user.id, id)?;
    let national_code = req.national_code.map(NationalId::new).transpose()?;

    let person = state.db.update_person(&id, |p| {
        if let Some(first_name) = req.first_name {
            p.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            p.last_name = last_name;
        }
        if let Some(code) = national_code {
            p.national_code = code;
        }
        if let Some(birth_date) = req.birth_date {
            p.birth_date = birth_date;
        }
        if let Some(relation) = req.relation {
            p.relation = relation;
        }
    })?;
    state.persist(Change::Person(&person)).await?;
    Ok(Json(PersonResponse::new(&person, today())))
}

/// DELETE /api/v1/persons/:id: Remove a dependent. Registrations drop it
/// from their covered set; documents keep existing unlinked.
#[utoipa::path(
    delete,
    path = "/api/v1/persons/{id}",
    params(("id" = Uuid, Path, description = "Person ID")),
    responses(
        (status = 204, description = "Dependent deleted"),
        (status = 404, description = "Not found or not the caller's", body = crate::error::ErrorBody),
    ),
    tag = "persons"
)]
async fn delete_person(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    owned_person(&state, user.id, id)?;
    state.db.delete_person(&id)?;
    state.persist(Change::Delete(Kind::Persons, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
