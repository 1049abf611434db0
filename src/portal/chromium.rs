//! Headless Chromium implementation of the session driver.

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, Handler, Page};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::layout::selectors;
use super::{Credentials, PortalDriver, PortalError, PortalLayout, PortalSession, View};
use crate::config::{BrowserConfig, TimeoutConfig};
use crate::utils::fmt_duration;

/// Delay between polls while waiting on a selector.
const POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Launches one Chromium process per session.
pub struct ChromiumDriver {
    layout: PortalLayout,
    browser: BrowserConfig,
    timeouts: TimeoutConfig,
}

impl ChromiumDriver {
    pub fn new(layout: PortalLayout, browser: BrowserConfig, timeouts: TimeoutConfig) -> Self {
        Self {
            layout,
            browser,
            timeouts,
        }
    }

    async fn launch(&self) -> Result<ChromiumSession, PortalError> {
        let mut builder = chromiumoxide::BrowserConfig::builder()
            .request_timeout(self.timeouts.navigation)
            .window_size(1280, 900);
        if !self.browser.headless {
            builder = builder.with_head();
        }
        if self.browser.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = self.browser.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(PortalError::Launch)?;

        let start = Instant::now();
        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| PortalError::Launch(e.to_string()))?;

        let disconnected = Arc::new(AtomicBool::new(false));
        let handler_task = spawn_handler_task(handler, Arc::clone(&disconnected));

        let mut session = ChromiumSession {
            browser: Some(browser),
            page: None,
            handler_task: Some(handler_task),
            disconnected,
            layout: self.layout.clone(),
            timeouts: self.timeouts,
            runtime: tokio::runtime::Handle::current(),
        };

        let opened = session.browser_ref()?.new_page("about:blank").await;
        let page = match opened {
            Ok(page) => page,
            Err(e) => {
                let err = session.map_cdp(e);
                session.shutdown().await;
                return Err(err);
            }
        };
        session.page = Some(page);

        debug!(duration = fmt_duration(start.elapsed()), "browser launched");
        Ok(session)
    }
}

#[async_trait]
impl PortalDriver for ChromiumDriver {
    async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn PortalSession>, PortalError> {
        let mut session = self.launch().await?;
        match session.sign_in(credentials).await {
            Ok(()) => Ok(Box::new(session)),
            Err(e) => {
                session.shutdown().await;
                Err(e)
            }
        }
    }
}

/// A launched browser with exactly one working page.
///
/// Closed explicitly through [`PortalSession::close`]. If the session is
/// dropped first (job timeout, panic), `Drop` hands the browser to a
/// background task that closes it.
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    disconnected: Arc<AtomicBool>,
    layout: PortalLayout,
    timeouts: TimeoutConfig,
    runtime: tokio::runtime::Handle,
}

impl ChromiumSession {
    fn browser_ref(&self) -> Result<&Browser, PortalError> {
        self.browser.as_ref().ok_or(PortalError::Closed)
    }

    fn page(&self) -> Result<&Page, PortalError> {
        self.page.as_ref().ok_or(PortalError::Closed)
    }

    fn map_cdp(&self, err: CdpError) -> PortalError {
        if self.disconnected.load(Ordering::SeqCst) {
            PortalError::Disconnected
        } else {
            PortalError::Protocol(err.to_string())
        }
    }

    async fn goto(&self, url: &Url) -> Result<(), PortalError> {
        let page = self.page()?;
        let limit = self.timeouts.navigation;
        let start = Instant::now();

        match tokio::time::timeout(limit, page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                if self.disconnected.load(Ordering::SeqCst) {
                    return Err(PortalError::Disconnected);
                }
                return Err(PortalError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(PortalError::Timeout {
                    what: format!("navigation to {}", url.path()),
                    elapsed: start.elapsed(),
                });
            }
        }

        trace!(path = url.path(), duration = fmt_duration(start.elapsed()), "navigated");
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), PortalError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| PortalError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element.click().await.map_err(|e| self.map_cdp(e))?;
        element.type_str(value).await.map_err(|e| self.map_cdp(e))?;
        Ok(())
    }

    async fn evaluate_bool(&self, script: String) -> Result<bool, PortalError> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| self.map_cdp(e))?;
        result
            .into_value::<bool>()
            .map_err(|e| PortalError::Script(e.to_string()))
    }

    async fn sign_in(&mut self, credentials: &Credentials) -> Result<(), PortalError> {
        let login_url = self.layout.login_url()?;
        self.goto(&login_url).await?;
        self.wait_for(selectors::LOGIN_USERNAME, self.timeouts.navigation)
            .await?;

        self.fill(selectors::LOGIN_USERNAME, &credentials.username)
            .await?;
        self.fill(selectors::LOGIN_PASSWORD, &credentials.password)
            .await?;

        let page = self.page()?;
        let submit = page
            .find_element(selectors::LOGIN_SUBMIT)
            .await
            .map_err(|_| PortalError::ElementNotFound {
                selector: selectors::LOGIN_SUBMIT.to_string(),
            })?;
        submit.click().await.map_err(|e| self.map_cdp(e))?;

        let start = Instant::now();
        match tokio::time::timeout(self.timeouts.navigation, page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.map_cdp(e)),
            Err(_) => {
                return Err(PortalError::Timeout {
                    what: "sign-in navigation".to_string(),
                    elapsed: start.elapsed(),
                });
            }
        }

        // A settled page without the marker means the portal bounced us back
        // to the sign-in form.
        match self
            .wait_for(selectors::AUTHENTICATED_MARKER, self.timeouts.selector)
            .await
        {
            Ok(()) => {
                info!(duration = fmt_duration(start.elapsed()), "signed in to portal");
                Ok(())
            }
            Err(e) if e.is_timeout() => Err(PortalError::LoginRejected),
            Err(e) => Err(e),
        }
    }

    /// Close page and browser, then stop the CDP handler. Safe to call twice.
    async fn shutdown(&mut self) {
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            trace!(error = %e, "page close failed");
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!(error = %e, "browser close failed");
            }
            if let Err(e) = browser.wait().await {
                debug!(error = %e, "browser process wait failed");
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl PortalSession for ChromiumSession {
    async fn navigate(&mut self, view: View) -> Result<(), PortalError> {
        let url = self.layout.view_url(view)?;
        self.goto(&url).await
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), PortalError> {
        let page = self.page()?;
        let start = Instant::now();
        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if self.disconnected.load(Ordering::SeqCst) {
                return Err(PortalError::Disconnected);
            }
            if start.elapsed() >= timeout {
                return Err(PortalError::Timeout {
                    what: selector.to_string(),
                    elapsed: start.elapsed(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, PortalError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return !!el && el.offsetParent !== null; }})()",
            js_string(selector)
        );
        self.evaluate_bool(script).await
    }

    async fn click(&mut self, selector: &str) -> Result<(), PortalError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| PortalError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element.click().await.map_err(|e| self.map_cdp(e))?;
        Ok(())
    }

    async fn wait_until_absent(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), PortalError> {
        let script = format!("document.querySelector({}) === null", js_string(selector));
        let start = Instant::now();
        loop {
            if self.evaluate_bool(script.clone()).await? {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(PortalError::Timeout {
                    what: format!("{selector} to disappear"),
                    elapsed: start.elapsed(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn html(&mut self) -> Result<String, PortalError> {
        let page = self.page()?;
        page.content().await.map_err(|e| self.map_cdp(e))
    }

    async fn close(&mut self) -> Result<(), PortalError> {
        self.shutdown().await;
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        let page = self.page.take();
        let browser = self.browser.take();
        let handler_task = self.handler_task.take();
        if browser.is_none() && page.is_none() {
            return;
        }

        warn!("browser session dropped without explicit close, closing in background");
        self.runtime.spawn(async move {
            if let Some(page) = page {
                let _ = page.close().await;
            }
            if let Some(mut browser) = browser {
                let _ = browser.close().await;
                let _ = browser.wait().await;
            }
            if let Some(task) = handler_task {
                task.abort();
            }
        });
    }
}

/// Drive the CDP event loop until the connection ends.
fn spawn_handler_task(mut handler: Handler, disconnected: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                trace!(error = %e, "cdp handler event error");
            }
        }
        disconnected.store(true, Ordering::SeqCst);
    })
}

/// Quote `value` as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
