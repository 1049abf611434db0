//! Shared fixtures: an in-memory portal that serves canned HTML per view.

#![allow(dead_code)]

use async_trait::async_trait;
use html_scraper::{Html, Selector};
use schoolwrap::config::{JobConfig, TimeoutConfig};
use schoolwrap::jobs::JobManager;
use schoolwrap::portal::layout::selectors;
use schoolwrap::portal::{Credentials, PortalDriver, PortalError, PortalSession, View};
use schoolwrap::scrape::{Phase, ProgressSink, ScrapePipeline};
use schoolwrap::state::AppState;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USERNAME: &str = "maija.meikalainen";
pub const PASSWORD: &str = "correct-horse";

pub const HOME_HTML: &str = r#"
<html><body>
  <div id="account-menu">Maija</div>
  <nav><ul>
    <li><a href="/messages">Viestit <span class="badge">4</span></a></li>
  </ul></nav>
</body></html>"#;

pub const PROFILE_HTML: &str = r#"
<html><body>
  <div id="account-menu">Maija</div>
  <div class="profile-card">
    <h1 class="profile-name">Maija Meikäläinen</h1>
    <p class="profile-school">Esimerkin lukio</p>
  </div>
</body></html>"#;

pub const GRADEBOOK_HTML: &str = r#"
<html><body>
  <div id="account-menu">Maija</div>
  <button id="gradebook-expand-all">Avaa kaikki</button>
  <table id="gradebook"><tbody>
    <tr class="level1"><td class="code"></td><td class="name">Lukion opetussuunnitelma</td><td class="grade"></td><td class="credits"></td><td class="date"></td><td class="teacher"></td></tr>
    <tr class="level2"><td class="code"></td><td class="name">Biologia</td><td class="grade"></td><td class="credits"></td><td class="date"></td><td class="teacher"></td></tr>
    <tr class="level3 collapsed"><td class="code">BG04</td><td class="name">Ihmisen biologia</td><td class="grade">9</td><td class="credits">2</td><td class="date">3.9.2025</td><td class="teacher">Virtanen</td></tr>
    <tr class="level3 collapsed"><td class="code">BG05</td><td class="name">Bioteknologia</td><td class="grade">8,5</td><td class="credits">2</td><td class="date">12.12.2025</td><td class="teacher">Virtanen</td></tr>
    <tr class="level2"><td class="code"></td><td class="name">Liikunta</td><td class="grade"></td><td class="credits"></td><td class="date"></td><td class="teacher"></td></tr>
    <tr class="level3"><td class="code">LI01</td><td class="name">Energiaa liikunnasta</td><td class="grade">S</td><td class="credits">2</td><td class="date">1.10.2025</td><td class="teacher">Korhonen</td></tr>
    <tr class="level3"><td class="code">LI02</td><td class="name">Aktiivinen elämäntapa</td><td class="grade"></td><td class="credits">2</td><td class="date"></td><td class="teacher">Korhonen</td></tr>
  </tbody></table>
</body></html>"#;

pub const CREDITS_HTML: &str = r#"
<html><body>
  <div id="account-menu">Maija</div>
  <table id="credit-summary">
    <thead><tr><th>Opintojakso</th><th>2024-2025</th><th>2025-2026</th><th>Yhteensä</th></tr></thead>
    <tbody>
      <tr><th>Pakollinen</th><td>5</td><td>3</td><td>8</td></tr>
      <tr><th>Valinnainen</th><td>2</td><td>1</td><td>3</td></tr>
    </tbody>
  </table>
</body></html>"#;

pub const ATTENDANCE_HTML: &str = r#"
<html><body>
  <div id="account-menu">Maija</div>
  <table id="attendance"><tbody>
    <tr>
      <td class="event" title="bg04 ; Terveydelliset syyt / ma 8.9. klo 8:15">T</td>
      <td class="event" title="BG04; Myöhässä alle 15 min / ti 9.9. klo 10:00">M</td>
      <td class="event" title="BG04; Luvaton poissaolo / ke 10.9. klo 8:15">L</td>
      <td class="event" title="LI01; Terveydelliset syyt / to 11.9. klo 12:30">T</td>
      <td class="event">-</td>
    </tr>
  </tbody></table>
</body></html>"#;

/// In-memory [`PortalDriver`]. Pages are served per view; individual views
/// can be made to fail or to drop the browser connection.
#[derive(Clone)]
pub struct FakePortal {
    pages: HashMap<View, String>,
    failing: HashSet<View>,
    disconnect_at: Option<View>,
    login_delay: Option<Duration>,
    closes: Arc<AtomicUsize>,
    logins: Arc<AtomicUsize>,
}

impl Default for FakePortal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePortal {
    pub fn new() -> Self {
        let pages = HashMap::from([
            (View::Home, HOME_HTML.to_string()),
            (View::Profile, PROFILE_HTML.to_string()),
            (View::Gradebook, GRADEBOOK_HTML.to_string()),
            (View::Credits, CREDITS_HTML.to_string()),
            (View::Attendance, ATTENDANCE_HTML.to_string()),
        ]);
        Self {
            pages,
            failing: HashSet::new(),
            disconnect_at: None,
            login_delay: None,
            closes: Arc::new(AtomicUsize::new(0)),
            logins: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_page(mut self, view: View, html: &str) -> Self {
        self.pages.insert(view, html.to_string());
        self
    }

    /// Navigation to `view` fails with a navigation error.
    pub fn failing(mut self, view: View) -> Self {
        self.failing.insert(view);
        self
    }

    /// The browser connection drops when navigating to `view`.
    pub fn disconnecting_at(mut self, view: View) -> Self {
        self.disconnect_at = Some(view);
        self
    }

    /// Sign-in takes this long (in tokio time).
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = Some(delay);
        self
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortalDriver for FakePortal {
    async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn PortalSession>, PortalError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.login_delay {
            tokio::time::sleep(delay).await;
        }
        if credentials.username != USERNAME || credentials.password != PASSWORD {
            return Err(PortalError::LoginRejected);
        }
        Ok(Box::new(FakeSession {
            portal: self.clone(),
            current: None,
            expanded: false,
            closed: false,
        }))
    }
}

pub struct FakeSession {
    portal: FakePortal,
    current: Option<View>,
    expanded: bool,
    closed: bool,
}

impl FakeSession {
    fn document(&self) -> Result<String, PortalError> {
        if self.closed {
            return Err(PortalError::Closed);
        }
        let view = self.current.ok_or(PortalError::ElementNotFound {
            selector: "html".to_string(),
        })?;
        let html = self.portal.pages.get(&view).cloned().unwrap_or_default();
        if self.expanded {
            Ok(html.replace(" collapsed", ""))
        } else {
            Ok(html)
        }
    }

    fn matches(&self, selector: &str) -> Result<bool, PortalError> {
        let html = self.document()?;
        let selector = Selector::parse(selector)
            .map_err(|e| PortalError::Script(format!("bad selector {selector}: {e}")))?;
        Ok(Html::parse_document(&html).select(&selector).next().is_some())
    }
}

#[async_trait]
impl PortalSession for FakeSession {
    async fn navigate(&mut self, view: View) -> Result<(), PortalError> {
        if self.closed {
            return Err(PortalError::Closed);
        }
        if self.portal.disconnect_at == Some(view) {
            return Err(PortalError::Disconnected);
        }
        if self.portal.failing.contains(&view) {
            return Err(PortalError::Navigation {
                url: format!("https://portal.test/{view}"),
                message: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        self.current = Some(view);
        self.expanded = false;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), PortalError> {
        if self.matches(selector)? {
            Ok(())
        } else {
            Err(PortalError::Timeout {
                what: selector.to_string(),
                elapsed: timeout,
            })
        }
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, PortalError> {
        self.matches(selector)
    }

    async fn click(&mut self, selector: &str) -> Result<(), PortalError> {
        if !self.matches(selector)? {
            return Err(PortalError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        if selector == selectors::GRADEBOOK_EXPAND_ALL {
            self.expanded = true;
        }
        Ok(())
    }

    async fn wait_until_absent(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), PortalError> {
        if self.matches(selector)? {
            Err(PortalError::Timeout {
                what: format!("{selector} to disappear"),
                elapsed: timeout,
            })
        } else {
            Ok(())
        }
    }

    async fn html(&mut self) -> Result<String, PortalError> {
        self.document()
    }

    async fn close(&mut self) -> Result<(), PortalError> {
        if !self.closed {
            self.closed = true;
            self.portal.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub fn credentials() -> Credentials {
    Credentials::new(USERNAME, PASSWORD)
}

pub fn wrong_credentials() -> Credentials {
    Credentials::new(USERNAME, "wrong")
}

pub fn pipeline(portal: &FakePortal) -> Arc<ScrapePipeline> {
    Arc::new(ScrapePipeline::new(
        Arc::new(portal.clone()),
        TimeoutConfig::default(),
    ))
}

pub fn job_manager(portal: &FakePortal, config: JobConfig) -> JobManager {
    JobManager::new(pipeline(portal), config)
}

pub fn app_state(portal: &FakePortal) -> AppState {
    let config = JobConfig::default();
    AppState::new(job_manager(portal, config), config.heartbeat_interval)
}

/// Records every progress checkpoint.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(u8, Phase)>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<(u8, Phase)> {
        self.events.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.events().into_iter().map(|(_, phase)| phase).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, percent: u8, phase: Phase, _message: &str) {
        self.events.lock().unwrap().push((percent, phase));
    }
}
