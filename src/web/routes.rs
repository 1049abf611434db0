//! Web API router construction.

use axum::{
    Router,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{jobs, status};

/// Upper bound for ordinary request/response handlers.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates the web server router
///
/// `run_and_wait` is bounded by the job timeout and the event stream is
/// long-lived, so neither sits behind the request timeout.
pub fn create_router(app_state: AppState) -> Router {
    let short_lived = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/jobs", post(jobs::start_job))
        .layer((
            CompressionLayer::new()
                .zstd(true)
                .br(true)
                .gzip(true)
                .quality(tower_http::CompressionLevel::Fastest),
            TimeoutLayer::new(REQUEST_TIMEOUT),
        ))
        .with_state(app_state.clone());

    let long_lived = Router::new()
        .route("/jobs/{id}/events", get(jobs::job_events))
        .route("/scrape", post(jobs::run_and_wait))
        .with_state(app_state);

    Router::new()
        .nest("/api", short_lived.merge(long_lived))
        // Outermost: per-request ID span + severity-proportional response logging.
        .layer(RequestIdLayer)
}
