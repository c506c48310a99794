//! # Middleware Stack
//!
//! Tower middleware for the API layer:
//! - [`tracing_layer`]: request/response tracing with `TraceLayer`.
//! - [`metrics`]: request counters per status class, served at `/metrics`.
//! - [`rate_limit`]: per-user fixed-window rate limiting.
//!
//! Authentication lives in [`crate::auth`] because its extractors are used
//! directly by handlers.

pub mod metrics;
pub mod rate_limit;
pub mod tracing_layer;
