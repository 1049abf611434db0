//! Per-request tracing spans with upstream-aware request IDs.
//!
//! Reuses an incoming `X-Request-Id` (set by a reverse proxy) when present,
//! otherwise generates a ULID. The resolved ID is echoed back in the
//! `X-Request-Id` response header.

use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::utils::fmt_duration;

static REQUEST_ID: &str = "x-request-id";

/// Upstream IDs longer than this are replaced with a fresh ULID.
const MAX_UPSTREAM_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, B> Service<Request> for RequestIdService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let req_id = resolve_request_id(&req);
        let header_value = HeaderValue::from_str(&req_id).ok();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let span = tracing::info_span!("request", req_id = %req_id);
        let start = Instant::now();

        let future = self.inner.call(req);

        Box::pin(
            async move {
                let mut result = future.await;
                let duration = fmt_duration(start.elapsed());

                match result {
                    Ok(ref mut response) => {
                        log_response(&method, &path, response.status(), &duration);
                        if let Some(value) = header_value {
                            response.headers_mut().insert(REQUEST_ID, value);
                        }
                    }
                    Err(ref e) => {
                        tracing::error!(%method, path, error = ?e, duration, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= MAX_UPSTREAM_ID_LEN)
        .map(String::from)
        .unwrap_or_else(|| ulid::Ulid::new().to_string())
}

/// Severity follows the status class: success is debug, client errors info,
/// everything else warn.
fn log_response(method: &Method, path: &str, status: StatusCode, duration: &str) {
    let status = status.as_u16();
    match status {
        200..=399 => tracing::debug!(%method, path, status, duration, "response"),
        400..=499 => tracing::info!(%method, path, status, duration, "response"),
        _ => tracing::warn!(%method, path, status, duration, "response"),
    }
}
