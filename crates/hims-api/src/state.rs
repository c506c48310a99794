//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! - **Tables** live in [`hims_core::Database`]: every constraint check and
//!   the write it guards happen under one lock, synchronously.
//! - **PostgreSQL** is optional. When a pool is configured, the tables are
//!   hydrated from it on startup and every mutation is written through
//!   with [`AppState::persist`].
//! - **Files** for uploaded documents live under the media root
//!   ([`FileStorage`]).

use std::path::PathBuf;

use chrono::Duration;
use hims_core::{Database, NationalId, User};
use sqlx::PgPool;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::auth::TokenService;
use crate::db::{self, Change};
use crate::error::AppError;
use crate::storage::FileStorage;

// -- Configuration ------------------------------------------------------------

/// Application configuration.
///
/// Custom `Debug` redacts the JWT secret and the database URL (which may
/// embed a password) to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// PostgreSQL connection string. `None` runs in-memory only.
    pub database_url: Option<String>,
    /// HS256 signing secret for access and refresh tokens.
    pub jwt_secret: Zeroizing<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Directory uploaded documents are stored under.
    pub media_root: PathBuf,
    /// Origins allowed by CORS (credentials are allowed for these).
    pub cors_origins: Vec<String>,
    /// Requests per client per minute before 429.
    pub rate_limit_per_minute: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("jwt_secret", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("media_root", &self.media_root)
            .field("cors_origins", &self.cors_origins)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            database_url: None,
            jwt_secret: Zeroizing::new("jwt-secret-dev-key".to_string()),
            access_token_ttl: Duration::minutes(30),
            refresh_token_ttl: Duration::days(7),
            media_root: PathBuf::from("media"),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            rate_limit_per_minute: 600,
        }
    }
}

/// A configuration variable is set but unparsable.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid value for {name}: {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

impl AppConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source. Unset or
    /// blank variables take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = parse_or(get("PORT"), "PORT", defaults.port)?;
        let access_minutes = parse_or(get("JWT_ACCESS_TOKEN_EXPIRE_MINUTES"), "JWT_ACCESS_TOKEN_EXPIRE_MINUTES", 30i64)?;
        let refresh_days = parse_or(get("JWT_REFRESH_TOKEN_EXPIRE_DAYS"), "JWT_REFRESH_TOKEN_EXPIRE_DAYS", 7i64)?;
        let rate_limit_per_minute = parse_or(get("RATE_LIMIT_PER_MINUTE"), "RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute)?;

        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.cors_origins,
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            jwt_secret: get("JWT_SECRET_KEY").map(Zeroizing::new).unwrap_or(defaults.jwt_secret),
            access_token_ttl: Duration::minutes(access_minutes),
            refresh_token_ttl: Duration::days(refresh_days),
            media_root: get("MEDIA_ROOT").map(PathBuf::from).unwrap_or(defaults.media_root),
            cors_origins,
            rate_limit_per_minute,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError { name, value }),
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state. Cloning is cheap: every field is a handle.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    /// PostgreSQL connection pool for durable persistence. When `None`, the
    /// API operates in in-memory-only mode.
    pub db_pool: Option<PgPool>,
    pub tokens: TokenService,
    pub files: FileStorage,
    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self::with_pool(config, None)
    }

    pub fn with_pool(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            db: Database::new(),
            db_pool,
            tokens: TokenService::new(&config),
            files: FileStorage::new(config.media_root.clone()),
            config,
        }
    }

    /// Replace the in-memory tables with the database contents.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let tables = db::load_tables(pool).await?;
        tracing::info!(
            users = tables.users.len(),
            persons = tables.persons.len(),
            schools = tables.schools.len(),
            plans = tables.plans.len(),
            registrations = tables.registrations.len(),
            documents = tables.documents.len(),
            "Hydrated in-memory tables from database"
        );
        self.db.load(tables);
        Ok(())
    }

    /// Write one committed change through to PostgreSQL.
    ///
    /// A failure is surfaced to the client: the in-memory row would be lost
    /// (or resurrected) on restart otherwise.
    pub async fn persist(&self, change: Change<'_>) -> Result<(), AppError> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };
        if let Err(e) = db::apply(pool, &change).await {
            tracing::error!(change = %change, error = %e, "failed to persist change to database");
            return Err(AppError::Internal(format!(
                "{change} applied in-memory but database persist failed"
            )));
        }
        Ok(())
    }

    /// Look an account up by login name.
    ///
    /// With a pool configured the row is read from PostgreSQL and refreshed
    /// in memory first, so accounts created or changed by the `hims` CLI
    /// take effect without a restart. A failed read falls back to memory.
    pub async fn resolve_user(&self, national_id: &NationalId) -> Option<User> {
        if let Some(pool) = &self.db_pool {
            match db::users::find_user_by_national_id(pool, national_id).await {
                Ok(Some(row)) => match self.db.restore_user(row) {
                    Ok(user) => return Some(user),
                    Err(e) => {
                        tracing::warn!(national_id = %national_id, error = %e, "stored user clashes with cached rows");
                    }
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "user lookup in database failed; using cached row"),
            }
        }
        self.db.find_user_by_national_id(national_id)
    }

    /// Whether the backing database, if any, answers a ping.
    pub async fn database_reachable(&self) -> bool {
        match &self.db_pool {
            None => true,
            Some(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.jwt_secret.as_str(), "jwt-secret-dev-key");
        assert_eq!(config.access_token_ttl, Duration::minutes(30));
        assert_eq!(config.refresh_token_ttl, Duration::days(7));
        assert_eq!(config.media_root, PathBuf::from("media"));
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn reads_every_variable() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://u:p@db/hims"),
            ("JWT_SECRET_KEY", "s3cret"),
            ("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", "5"),
            ("JWT_REFRESH_TOKEN_EXPIRE_DAYS", "1"),
            ("MEDIA_ROOT", "/var/lib/hims"),
            ("CORS_ORIGINS", "https://a.example, https://b.example ,"),
            ("RATE_LIMIT_PER_MINUTE", "10"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_url.as_deref(), Some("postgres://u:p@db/hims"));
        assert_eq!(config.jwt_secret.as_str(), "s3cret");
        assert_eq!(config.access_token_ttl, Duration::minutes(5));
        assert_eq!(config.refresh_token_ttl, Duration::days(1));
        assert_eq!(config.media_root, PathBuf::from("/var/lib/hims"));
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.rate_limit_per_minute, 10);
    }

    #[test]
    fn unparsable_number_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(err.name, "PORT");
        assert!(err.to_string().contains("eighty"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://u:hunter2@db/hims"),
            ("JWT_SECRET_KEY", "topsecret"),
        ]))
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn in_memory_state_is_ready_and_persist_is_a_no_op() {
        let state = AppState::default();
        assert!(state.database_reachable().await);
        state
            .persist(Change::Delete(db::Kind::Users, uuid::Uuid::new_v4()))
            .await
            .unwrap();
        state.hydrate_from_db().await.unwrap();
    }

    #[tokio::test]
    async fn resolve_user_without_a_pool_reads_memory() {
        let state = AppState::default();
        let id = NationalId::new("0012345678").unwrap();
        assert!(state.resolve_user(&id).await.is_none());

        let user = state
            .db
            .insert_user(hims_core::user::NewUser {
                national_id: id.clone(),
                first_name: "Sara".into(),
                last_name: "Ahmadi".into(),
                email: None,
                phone: None,
                password_hash: "$argon2id$stub".into(),
                is_staff: false,
                is_admin: false,
            })
            .unwrap();
        assert_eq!(state.resolve_user(&id).await.map(|u| u.id), Some(user.id));
    }
}
