//! Scrape job endpoints: start-job, the progress event stream, and run-and-wait.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use custom_debug_derive::Debug as CustomDebug;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::jobs::{JobError, JobId};
use crate::portal::Credentials;
use crate::scrape::{ScrapeMode, ScrapeResult};
use crate::state::AppState;
use crate::web::error::ApiError;

static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Body of `POST /api/jobs` and `POST /api/scrape`.
#[derive(CustomDebug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    #[debug(skip)]
    pub password: String,
    #[serde(default)]
    pub mode: Option<String>,
}

impl ScrapeRequest {
    fn into_parts(self) -> Result<(Credentials, ScrapeMode), ApiError> {
        let mode = match self.mode.as_deref() {
            Some(raw) => raw.parse::<ScrapeMode>()?,
            None => ScrapeMode::default(),
        };
        Ok((Credentials::new(self.username, self.password), mode))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobResponse {
    pub job_id: JobId,
}

fn read_body(
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<ScrapeRequest, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        ApiError::bad_request("Malformed request body").with_details(rejection.body_text())
    })
}

/// `POST /api/jobs`
pub(super) async fn start_job(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StartJobResponse>), ApiError> {
    let (credentials, mode) = read_body(payload)?.into_parts()?;
    let job_id = state.jobs.start(credentials, mode)?;
    info!(%job_id, %mode, "scrape job accepted");
    Ok((StatusCode::ACCEPTED, Json(StartJobResponse { job_id })))
}

/// `GET /api/jobs/{id}/events`
///
/// Server-sent events: the job's current event first, then every later one.
/// The stream ends after the terminal event or when the server shuts down.
pub(super) async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let job_id: JobId = id.parse().map_err(|_| JobError::NotFound)?;
    let subscription = state.jobs.attach(&job_id)?;
    debug!(%job_id, "subscriber attached");

    let stream = subscription
        .into_stream()
        .map(|event| Event::default().json_data(event))
        .take_until(state.shutdown.clone().cancelled_owned());

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.heartbeat_interval)
            .text("keep-alive"),
    );

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING.clone(), "no"),
        ],
        sse,
    )
        .into_response())
}

/// `POST /api/scrape`
pub(super) async fn run_and_wait(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<Json<ScrapeResult>, ApiError> {
    let (credentials, mode) = read_body(payload)?.into_parts()?;
    let result = state.jobs.run_and_wait(credentials, mode).await?;
    Ok(Json(result))
}
