//! # Request Metrics
//!
//! Lightweight request metrics using atomic counters, bucketed by response
//! status class. Exposed as JSON at `GET /metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use utoipa::ToSchema;

/// Shared metrics state.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    success: AtomicU64,
    redirect: AtomicU64,
    client_error: AtomicU64,
    server_error: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    /// 1xx and 2xx responses.
    pub responses_2xx: u64,
    pub responses_3xx: u64,
    pub responses_4xx: u64,
    pub responses_5xx: u64,
}

impl ApiMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return current request count.
    pub fn requests(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    /// Return current error (4xx + 5xx) count.
    pub fn errors(&self) -> u64 {
        self.inner.client_error.load(Ordering::Relaxed) + self.inner.server_error.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.inner;
        MetricsSnapshot {
            requests_total: c.requests.load(Ordering::Relaxed),
            responses_2xx: c.success.load(Ordering::Relaxed),
            responses_3xx: c.redirect.load(Ordering::Relaxed),
            responses_4xx: c.client_error.load(Ordering::Relaxed),
            responses_5xx: c.server_error.load(Ordering::Relaxed),
        }
    }

    fn record(&self, status: axum::http::StatusCode) {
        let c = &self.inner;
        c.requests.fetch_add(1, Ordering::Relaxed);
        let bucket = if status.is_server_error() {
            &c.server_error
        } else if status.is_client_error() {
            &c.client_error
        } else if status.is_redirection() {
            &c.redirect
        } else {
            &c.success
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }
}

/// Middleware that counts every response by status class.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record(response.status());
    }

    response
}
