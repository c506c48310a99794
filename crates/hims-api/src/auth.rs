//! # Authentication & Authorization
//!
//! JWT bearer authentication with two scopes: "user" (any active account)
//! and "admin" (`is_admin`).
//!
//! ## Tokens
//!
//! HS256 tokens carrying `{sub: national_id, type, exp, iat}`. An access
//! token is short-lived and authorizes requests; a refresh token is only
//! accepted by `POST /api/v1/auth/refresh`. A token of the wrong type is
//! rejected as if it were invalid.
//!
//! ## Credentials
//!
//! [`auth_middleware`] never rejects a request. It resolves the
//! `Authorization` header into a [`Credentials`] value and stores it in the
//! request extensions. Public handlers ignore it; protected handlers take a
//! [`CurrentUser`] or [`AdminUser`] extractor, which turn anything other
//! than an active account into 401 / 403.

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use hims_core::{NationalId, User};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::{AppConfig, AppState};

// ── Claims ──────────────────────────────────────────────────────────────────

/// Which endpoint family a token is good for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// National id of the account.
    pub sub: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub exp: i64,
    pub iat: i64,
}

/// Response body of register, login and refresh.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
}

// ── Token Service ───────────────────────────────────────────────────────────

/// Issues and verifies tokens.
///
/// Custom `Debug` omits the keys to prevent credential leakage in logs.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenService {
    pub fn new(config: &AppConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    /// Sign a token of `kind` for `subject`, issued at `now`.
    pub fn issue_at(&self, subject: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<String, AppError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: subject.to_string(),
            kind,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
    }

    /// A fresh access + refresh pair for `user`.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        let subject = user.national_id.as_str();
        Ok(TokenPair {
            access_token: self.issue_at(subject, TokenKind::Access, now)?,
            refresh_token: self.issue_at(subject, TokenKind::Refresh, now)?,
            token_type: "bearer".to_string(),
        })
    }

    /// Verify signature, expiry and token type. Errors are client-facing
    /// messages.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => "token has expired".to_string(),
            _ => "invalid token".to_string(),
        })?;
        if data.claims.kind != expected {
            return Err(format!("expected a {} token", expected.as_str()));
        }
        Ok(data.claims)
    }
}

// ── Credentials ─────────────────────────────────────────────────────────────

/// What the `Authorization` header resolved to.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// No `Authorization` header.
    Missing,
    /// Header present but the token is unusable (scheme, signature, expiry,
    /// type, unknown subject).
    Invalid(String),
    /// Token valid, account deactivated.
    Inactive,
    Authenticated(User),
}

impl Credentials {
    /// Resolve a raw token against the user table.
    pub async fn from_token(state: &AppState, token: &str, kind: TokenKind) -> Self {
        let claims = match state.tokens.decode(token, kind) {
            Ok(claims) => claims,
            Err(msg) => return Self::Invalid(msg),
        };
        let user = match claims.sub.parse::<NationalId>() {
            Ok(id) => state.resolve_user(&id).await,
            Err(_) => None,
        };
        match user {
            None => Self::Invalid("user not found".to_string()),
            Some(user) if !user.is_active => Self::Inactive,
            Some(user) => Self::Authenticated(user),
        }
    }

    async fn from_headers(state: &AppState, headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Self::Missing;
        };
        match value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            Some(token) => Self::from_token(state, token.trim(), TokenKind::Access).await,
            None => Self::Invalid("authorization header must use Bearer scheme".to_string()),
        }
    }

    /// The authenticated user, or the 401 / 403 the caller should see.
    pub fn into_user(self) -> Result<User, AppError> {
        match self {
            Self::Authenticated(user) => Ok(user),
            Self::Missing => Err(AppError::Unauthorized("missing authorization header".to_string())),
            Self::Invalid(msg) => Err(AppError::Unauthorized(msg)),
            Self::Inactive => Err(AppError::Forbidden("user account is deactivated".to_string())),
        }
    }

    /// Authenticated user id, if any.
    pub fn user_id(&self) -> Option<uuid::Uuid> {
        match self {
            Self::Authenticated(user) => Some(user.id),
            _ => None,
        }
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Resolve the bearer token and inject [`Credentials`] into the request
/// extensions.
pub async fn auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let credentials = Credentials::from_headers(&state, request.headers()).await;
    if let Credentials::Invalid(reason) = &credentials {
        tracing::warn!(reason = %reason, path = %request.uri().path(), "authentication failed");
    }
    request.extensions_mut().insert(credentials);
    next.run(request).await
}

// ── Extractors ──────────────────────────────────────────────────────────────

fn credentials(parts: &Parts) -> Credentials {
    parts
        .extensions
        .get::<Credentials>()
        .cloned()
        .unwrap_or(Credentials::Missing)
}

/// The active account behind the access token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        credentials(parts).into_user().map(CurrentUser)
    }
}

/// An active administrator.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = credentials(parts).into_user()?;
        if !user.is_admin {
            return Err(AppError::Forbidden("administrator access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
