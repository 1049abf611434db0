//! Session driver: owns one remote browser session per scrape attempt.
//!
//! The pipeline only talks to the [`PortalDriver`] / [`PortalSession`] seams;
//! [`chromium::ChromiumDriver`] is the production implementation.

pub mod chromium;
mod errors;
pub mod layout;

pub use errors::PortalError;
pub use layout::{PortalLayout, View};

use async_trait::async_trait;
use custom_debug_derive::Debug as CustomDebug;
use std::time::Duration;

/// Portal sign-in credentials. The password never appears in `Debug` output.
#[derive(Clone, CustomDebug)]
pub struct Credentials {
    pub username: String,
    #[debug(skip)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Opens authenticated portal sessions.
#[async_trait]
pub trait PortalDriver: Send + Sync {
    /// Open a browser, sign in, and return a session positioned on the
    /// landing page.
    ///
    /// Returns [`PortalError::LoginRejected`] when the portal settles on a page
    /// without the authenticated marker. Any session opened here is closed
    /// again before an error is returned.
    async fn login(&self, credentials: &Credentials)
    -> Result<Box<dyn PortalSession>, PortalError>;
}

/// One authenticated browser session with a single page.
///
/// Strictly sequential: one navigation or wait at a time.
#[async_trait]
pub trait PortalSession: Send {
    /// Go to `view` and wait until the navigation has settled.
    async fn navigate(&mut self, view: View) -> Result<(), PortalError>;

    /// Wait until `selector` matches at least one element.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), PortalError>;

    /// Whether `selector` matches a rendered (visible) element right now.
    async fn is_visible(&mut self, selector: &str) -> Result<bool, PortalError>;

    async fn click(&mut self, selector: &str) -> Result<(), PortalError>;

    /// Wait until `selector` no longer matches anything.
    async fn wait_until_absent(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), PortalError>;

    /// Serialized HTML of the current document.
    async fn html(&mut self) -> Result<String, PortalError>;

    /// Release the browser. Idempotent.
    async fn close(&mut self) -> Result<(), PortalError>;
}
