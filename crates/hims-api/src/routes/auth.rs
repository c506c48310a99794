//! # Authentication API
//!
//! ## Endpoints
//!
//! - `POST /api/v1/auth/register`: create an account, returns a token pair
//! - `POST /api/v1/auth/login`: national id + password, returns a token pair
//! - `POST /api/v1/auth/refresh`: exchange a refresh token for a new pair
//! - `GET /api/v1/auth/me`: the authenticated account

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use hims_core::password::{decoy_hash, MIN_PASSWORD_LEN};
use hims_core::user::NewUser;
use hims_core::{NationalId, User};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Credentials, CurrentUser, TokenKind, TokenPair};
use crate::db::Change;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request to create an account.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Ten-digit national id; the login name.
    pub national_id: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// Eleven-digit mobile number.
    pub phone: Option<String>,
    pub password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), String> {
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!("password must be at least {MIN_PASSWORD_LEN} characters"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub national_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// The authenticated account.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub id: Uuid,
    pub national_id: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_admin: bool,
}

impl From<&User> for MeResponse {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            national_id: u.national_id.to_string(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            phone: u.phone.clone(),
            is_admin: u.is_admin,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/me", get(me))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /api/v1/auth/register: Create an account.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = TokenPair),
        (status = 409, description = "National id or email already registered", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenPair>), AppError> {
    let req = extract_validated_json(body)?;
    let national_id = NationalId::new(req.national_id)?;
    let password_hash = super::hash_password(req.password).await?;

    let user = state.db.insert_user(NewUser {
        national_id,
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        phone: req.phone,
        password_hash,
        is_staff: false,
        is_admin: false,
    })?;
    state.persist(Change::User(&user)).await?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(state.tokens.issue_pair(&user)?)))
}

/// POST /api/v1/auth/login: Exchange credentials for a token pair.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenPair),
        (status = 401, description = "Wrong national id or password", body = crate::error::ErrorBody),
        (status = 403, description = "Account deactivated", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, AppError> {
    let req = extract_json(body)?;
    let invalid = || AppError::Unauthorized("invalid national id or password".to_string());

    let user = match req.national_id.parse::<NationalId>() {
        Ok(id) => state.resolve_user(&id).await,
        Err(_) => None,
    };
    // Unknown accounts cost the same Argon2 work as a wrong password.
    let stored = user
        .as_ref()
        .map_or_else(|| decoy_hash().to_string(), |u| u.password_hash.clone());
    let verified = super::verify_password(req.password, stored).await?;
    let user = match user {
        Some(user) if verified => user,
        Some(user) => {
            tracing::warn!(user_id = %user.id, "login failed: wrong password");
            return Err(invalid());
        }
        None => return Err(invalid()),
    };
    if !user.is_active {
        return Err(AppError::Forbidden("user account is deactivated".to_string()));
    }

    Ok(Json(state.tokens.issue_pair(&user)?))
}

/// POST /api/v1/auth/refresh: Issue a new pair from a refresh token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid, expired or non-refresh token", body = crate::error::ErrorBody),
        (status = 403, description = "Account deactivated", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn refresh(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, AppError> {
    let req = extract_json(body)?;
    let user = Credentials::from_token(&state, req.refresh_token.trim(), TokenKind::Refresh)
        .await
        .into_user()?;
    Ok(Json(state.tokens.issue_pair(&user)?))
}

/// GET /api/v1/auth/me: The authenticated account.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current account", body = MeResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn me(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse::from(&user))
}
