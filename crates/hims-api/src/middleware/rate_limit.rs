//! # Per-User Rate Limiting
//!
//! Fixed-window request counter keyed by the authenticated user id. Requests
//! without valid credentials share the `"anonymous"` bucket.
//!
//! Runs inside the auth middleware so the [`Credentials`] are already
//! resolved.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;

use crate::auth::Credentials;
use crate::error::ErrorBody;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u64,
    /// Window duration in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 600,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    /// `n` requests per minute.
    pub fn per_minute(n: u64) -> Self {
        Self {
            max_requests: n,
            window_secs: 60,
        }
    }
}

/// Per-key rate limit state.
#[derive(Debug, Clone)]
struct BucketState {
    count: u64,
    window_start: Instant,
}

/// Shared rate limiter state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<Mutex<HashMap<String, BucketState>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count a request from `key`; false once the window's allowance is used.
    fn check(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();
        let window = Duration::from_secs(self.config.window_secs);

        let bucket = buckets.entry(key.to_string()).or_insert(BucketState {
            count: 0,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= self.config.max_requests {
            false
        } else {
            bucket.count += 1;
            true
        }
    }
}

/// Middleware that enforces per-client rate limits.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let limiter = request.extensions().get::<RateLimiter>().cloned();

    if let Some(limiter) = limiter {
        let key = request
            .extensions()
            .get::<Credentials>()
            .and_then(Credentials::user_id)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "anonymous".to_string());

        if !limiter.check(&key, Instant::now()) {
            tracing::warn!(client = %key, "rate limit exceeded");
            let body = ErrorBody::new("RATE_LIMITED", "rate limit exceeded");
            return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        }
    }

    next.run(request).await
}
