//! # Request/Response Tracing
//!
//! Configures `tower_http::trace::TraceLayer` for structured request
//! logging with tracing spans.

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Build a `TraceLayer` for the API.
///
/// Each request gets an INFO span with method, URI and version; the
/// response is logged at INFO with status and latency.
pub fn layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}
