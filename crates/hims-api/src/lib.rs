//! # hims-api: Axum API Services
//!
//! The REST service of the Health Insurance Management Stack, built on
//! Axum/Tower/Tokio. Users register with their national id, manage their
//! dependents, enrol in an insurance plan through a school and upload
//! supporting documents; administrators manage the catalogue, the location
//! hierarchy and every account.
//!
//! ## API Surface
//!
//! | Prefix                    | Auth  | Module |
//! |---------------------------|-------|--------|
//! | `/api/v1/auth/*`          | mixed | [`routes::auth`] |
//! | `/api/v1/users/*`         | user  | [`routes::users`] |
//! | `/api/v1/persons/*`       | user  | [`routes::persons`] |
//! | `/api/v1/locations/*`     | public | [`routes::locations`] |
//! | `/api/v1/insurance/*`     | mixed | [`routes::insurance`] |
//! | `/api/v1/documents/*`     | user, admin | [`routes::documents`] |
//! | `/api/v1/statistics/*`    | user, admin | [`routes::statistics`] |
//! | `/api/v1/admin/*`         | admin | [`routes::admin`], [`routes::admin_insurance`], [`routes::admin_locations`] |
//! | `/`, `/health/*`, `/metrics` | public | this module |
//! | `/openapi.json`           | public | [`openapi`] |
//!
//! ## Middleware Stack (Tower)
//!
//! CORS → Trace → Metrics → Auth → RateLimit → handler
//!
//! Auth never rejects on its own: it resolves the bearer token into
//! [`auth::Credentials`] and the `CurrentUser` / `AdminUser` extractors
//! decide per handler.
//!
//! ## Crate Policy
//!
//! - Sits at the top of the dependency DAG.
//! - Constraint logic lives in `hims-core`; handlers translate requests,
//!   call the store, persist the change and shape the response.
//! - All errors map to structured HTTP responses via `AppError`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod storage;

pub use error::AppError;
pub use state::AppState;

use axum::http::HeaderValue;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::middleware::metrics::{ApiMetrics, MetricsSnapshot};
use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter};

/// Assemble the full application router with all routes and middleware.
///
/// Service endpoints (`/`, `/health*`, `/metrics`) are mounted outside the
/// auth, metrics and rate-limit layers.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();
    let limiter = RateLimiter::new(RateLimitConfig::per_minute(state.config.rate_limit_per_minute));
    let cors = cors_layer(&state.config.cors_origins);

    let api = Router::new()
        .merge(routes::router())
        .merge(openapi::router())
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(Extension(metrics.clone()))
        .layer(Extension(limiter))
        .with_state(state.clone());

    let service = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(metrics_snapshot))
        .layer(Extension(metrics))
        .with_state(state);

    Router::new().merge(service).merge(api).layer(cors)
}

/// Credentialed CORS for the configured origins. Origins that are not valid
/// header values are skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// GET /: Service banner.
async fn root() -> Json<Value> {
    Json(json!({
        "message": "Health Insurance Management System API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/openapi.json",
    }))
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 503 while a configured database is unreachable.
async fn readiness(axum::extract::State(state): axum::extract::State<AppState>) -> Result<&'static str, AppError> {
    if state.database_reachable().await {
        Ok("ready")
    } else {
        Err(AppError::ServiceUnavailable("database unreachable".to_string()))
    }
}

/// GET /metrics: Request counters since startup.
async fn metrics_snapshot(Extension(metrics): Extension<ApiMetrics>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    #[tokio::test]
    async fn probes_answer_without_credentials() {
        let app = app(AppState::default());
        assert_eq!(get(app.clone(), "/health/liveness").await, (StatusCode::OK, b"ok".to_vec()));
        assert_eq!(get(app.clone(), "/health/readiness").await, (StatusCode::OK, b"ready".to_vec()));
        let (status, body) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "healthy");
    }

    #[tokio::test]
    async fn root_reports_version() {
        let (status, body) = get(app(AppState::default()), "/").await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(v["docs"], "/openapi.json");
    }

    #[tokio::test]
    async fn metrics_count_api_requests() {
        let app = app(AppState::default());
        let (status, _) = get(app.clone(), "/api/v1/auth/me").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (_, body) = get(app, "/metrics").await;
        let snap: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(snap["requests_total"], 1);
        assert_eq!(snap["responses_4xx"], 1);
    }

    #[tokio::test]
    async fn openapi_is_served() {
        let (status, body) = get(app(AppState::default()), "/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert!(v["paths"]["/api/v1/auth/login"].is_object());
    }

    #[test]
    fn invalid_cors_origins_are_skipped() {
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
    }
}
