//! Application state shared by the HTTP handlers.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::jobs::JobManager;

#[derive(Clone)]
pub struct AppState {
    pub jobs: JobManager,
    /// Interval between SSE keep-alive comments.
    pub heartbeat_interval: Duration,
    /// Cancelled when the server begins shutting down; ends open event streams.
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(jobs: JobManager, heartbeat_interval: Duration) -> Self {
        Self {
            jobs,
            heartbeat_interval,
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }
}
