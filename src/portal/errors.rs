//! Error types for the portal session driver.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("timed out after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("portal did not accept the supplied credentials")]
    LoginRejected,
    #[error("browser connection lost")]
    Disconnected,
    #[error("browser session already closed")]
    Closed,
    #[error("invalid portal url: {0}")]
    Url(#[from] url::ParseError),
}

impl PortalError {
    /// True when the browser session itself is unusable, as opposed to a
    /// single page or selector misbehaving.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            PortalError::Disconnected | PortalError::Closed | PortalError::Launch(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PortalError::Timeout { .. })
    }
}
