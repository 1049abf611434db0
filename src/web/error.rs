//! JSON error responses for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::jobs::JobError;
use crate::scrape::{ErrorKind, ScrapeError};

/// Machine-readable error codes returned in the `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    InvalidInput,
    LoginFailed,
    SessionFailure,
    JobNotFound,
    InternalError,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::LoginFailed => StatusCode::UNAUTHORIZED,
            ApiErrorCode::JobNotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::SessionFailure | ApiErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidInput, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        let code = match err.kind() {
            ErrorKind::InvalidInput => ApiErrorCode::InvalidInput,
            ErrorKind::LoginFailed => ApiErrorCode::LoginFailed,
            ErrorKind::SessionFailure => ApiErrorCode::SessionFailure,
        };
        ApiError::new(code, err.user_message()).with_details(err.details())
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound => ApiError::new(ApiErrorCode::JobNotFound, "Job not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_errors_keep_their_status_hint() {
        for err in [
            ScrapeError::InvalidInput("username is required".to_string()),
            ScrapeError::LoginFailed,
            ScrapeError::SessionFailure {
                message: "x".to_string(),
                details: "y".to_string(),
            },
        ] {
            let hint = err.status_hint();
            let api: ApiError = err.into();
            assert_eq!(api.status().as_u16(), hint);
        }
    }

    #[test]
    fn body_shape() {
        let api = ApiError::from(JobError::NotFound);
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], "job_not_found");
        assert!(json.get("details").is_none());
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
    }
}
