//! Pipeline-level error taxonomy.

use serde::{Deserialize, Serialize};

use crate::portal::{PortalError, View};

/// Failures that end a scrape. Per-view extraction problems never show up
/// here; they degrade to empty data inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("portal rejected the credentials")]
    LoginFailed,
    #[error("{message}: {details}")]
    SessionFailure { message: String, details: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    LoginFailed,
    SessionFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::LoginFailed => "login_failed",
            ErrorKind::SessionFailure => "session_failure",
        }
    }
}

impl ScrapeError {
    /// Classify a failure from the sign-in stage.
    pub fn from_login(err: PortalError) -> Self {
        match err {
            PortalError::LoginRejected => ScrapeError::LoginFailed,
            other => ScrapeError::SessionFailure {
                message: "could not sign in to the portal".to_string(),
                details: other.to_string(),
            },
        }
    }

    pub fn session_lost(view: View, err: impl std::fmt::Display) -> Self {
        ScrapeError::SessionFailure {
            message: format!("browser session lost while reading {view}"),
            details: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::InvalidInput(_) => ErrorKind::InvalidInput,
            ScrapeError::LoginFailed => ErrorKind::LoginFailed,
            ScrapeError::SessionFailure { .. } => ErrorKind::SessionFailure,
        }
    }

    /// HTTP-style status the caller should map this error to.
    pub fn status_hint(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidInput => 400,
            ErrorKind::LoginFailed => 401,
            ErrorKind::SessionFailure => 500,
        }
    }

    /// Tells the caller whether to fix the request or retry later.
    pub fn user_message(&self) -> String {
        match self {
            ScrapeError::InvalidInput(reason) => format!("Invalid request: {reason}."),
            ScrapeError::LoginFailed => {
                "Sign-in failed. Check your username and password.".to_string()
            }
            ScrapeError::SessionFailure { .. } => {
                "The school portal could not be reached. Try again later.".to_string()
            }
        }
    }

    /// Raw diagnostic text. Never contains credential values.
    pub fn details(&self) -> String {
        match self {
            ScrapeError::InvalidInput(reason) => reason.clone(),
            ScrapeError::LoginFailed => "authenticated page marker absent after sign-in".to_string(),
            ScrapeError::SessionFailure { details, .. } => details.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rejected_login_is_authentication_error() {
        let err = ScrapeError::from_login(PortalError::LoginRejected);
        assert_eq!(err.kind(), ErrorKind::LoginFailed);
        assert_eq!(err.status_hint(), 401);
        assert!(err.user_message().contains("username and password"));
    }

    #[test]
    fn login_timeout_is_session_failure() {
        let err = ScrapeError::from_login(PortalError::Timeout {
            what: "navigation to /login".to_string(),
            elapsed: Duration::from_secs(10),
        });
        assert_eq!(err.kind(), ErrorKind::SessionFailure);
        assert_eq!(err.status_hint(), 500);
        assert!(err.details().contains("/login"));
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ErrorKind::SessionFailure).unwrap(),
            "session_failure"
        );
        assert_eq!(ErrorKind::InvalidInput.as_str(), "invalid_input");
    }
}
