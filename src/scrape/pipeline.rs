use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{Phase, ProgressSink, ScrapeError, ScrapeMode, ScrapeResult, Step, merge_attendance};
use crate::config::TimeoutConfig;
use crate::extract::{self, ExtractError};
use crate::portal::{Credentials, PortalDriver, PortalSession, View};
use crate::utils::fmt_duration;

const LOGIN_PERCENT: u8 = 8;
const LOGGED_IN_PERCENT: u8 = 24;
const FINALIZE_PERCENT: u8 = 96;

/// Scrapes slower than this are logged at warn.
const SLOW_SCRAPE: Duration = Duration::from_secs(60);

/// Runs one scrape per call against sessions from `driver`.
pub struct ScrapePipeline {
    driver: Arc<dyn PortalDriver>,
    timeouts: TimeoutConfig,
}

impl ScrapePipeline {
    pub fn new(driver: Arc<dyn PortalDriver>, timeouts: TimeoutConfig) -> Self {
        Self { driver, timeouts }
    }

    /// Sign in, visit the views `mode` covers, and build the result.
    ///
    /// Only sign-in failures and a lost browser session are errors. A view
    /// that cannot be read contributes its empty default instead. The
    /// session is closed before returning on every path.
    pub async fn run(
        &self,
        credentials: &Credentials,
        mode: ScrapeMode,
        progress: &dyn ProgressSink,
    ) -> Result<ScrapeResult, ScrapeError> {
        validate_credentials(credentials)?;
        let start = Instant::now();

        progress.report(LOGIN_PERCENT, Phase::Login, "Signing in to the portal");
        let mut session = self
            .driver
            .login(credentials)
            .await
            .map_err(ScrapeError::from_login)?;
        progress.report(LOGGED_IN_PERCENT, Phase::LoginSuccess, "Signed in");

        let outcome = self.collect(session.as_mut(), mode, progress).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close browser session");
        }

        let elapsed = start.elapsed();
        let slow = elapsed > SLOW_SCRAPE;
        match &outcome {
            Ok(_) if slow => {
                warn!(%mode, duration = fmt_duration(elapsed), "scrape finished slowly");
            }
            Ok(_) => info!(%mode, duration = fmt_duration(elapsed), "scrape finished"),
            Err(e) if slow => {
                warn!(%mode, duration = fmt_duration(elapsed), error = %e, "slow scrape failed");
            }
            Err(_) => {}
        }
        outcome
    }

    async fn collect(
        &self,
        session: &mut dyn PortalSession,
        mode: ScrapeMode,
        progress: &dyn ProgressSink,
    ) -> Result<ScrapeResult, ScrapeError> {
        let timeouts = &self.timeouts;
        let steps = mode.steps();
        let mut result = ScrapeResult::empty();

        for (i, step) in steps.iter().enumerate() {
            let percent = step_percent(i, steps.len());
            match step {
                Step::Profile => {
                    progress.report(percent, Phase::Profile, "Reading profile");
                    let profile = async {
                        session.navigate(View::Profile).await?;
                        extract::profile::fetch(session, timeouts).await
                    }
                    .await;
                    result.profile = Some(absorb(View::Profile, profile)?);
                }
                Step::Unread => {
                    progress.report(percent, Phase::Unread, "Counting unread messages");
                    let unread = async {
                        session.navigate(View::Home).await?;
                        extract::unread::fetch(session, timeouts).await
                    }
                    .await;
                    result.unread_messages = Some(absorb(View::Home, unread)?);
                }
                Step::Grades => {
                    progress.report(percent, Phase::Grades, "Reading gradebook");
                    let gradebook = async {
                        session.navigate(View::Gradebook).await?;
                        extract::gradebook::fetch(session, timeouts).await
                    }
                    .await;
                    result.gradebook = Some(absorb(View::Gradebook, gradebook)?);

                    let ects = async {
                        session.navigate(View::Credits).await?;
                        extract::ects::fetch(session, timeouts).await
                    }
                    .await;
                    result.ects = Some(absorb(View::Credits, ects)?);
                }
                Step::Attendance => {
                    progress.report(percent, Phase::Attendance, "Reading attendance");
                    let attendance = async {
                        session.navigate(View::Attendance).await?;
                        extract::attendance::fetch(session, timeouts).await
                    }
                    .await;
                    result.attendance = Some(absorb(View::Attendance, attendance)?);
                }
            }
        }

        if mode == ScrapeMode::All {
            progress.report(FINALIZE_PERCENT, Phase::Finalize, "Combining results");
            if let (Some(gradebook), Some(attendance)) =
                (result.gradebook.as_mut(), result.attendance.as_deref())
            {
                merge_attendance(gradebook, attendance);
            }
        }

        Ok(result)
    }
}

/// Keep a view's data, or fall back to its empty default.
///
/// A lost browser session is the one extractor failure that ends the scrape,
/// since no later view could be read either.
fn absorb<T: Default>(view: View, result: Result<T, ExtractError>) -> Result<T, ScrapeError> {
    match result {
        Ok(value) => {
            debug!(%view, "view extracted");
            Ok(value)
        }
        Err(e) if e.is_session_lost() => Err(ScrapeError::session_lost(view, e)),
        Err(e) => {
            warn!(%view, error = %e, "view extraction degraded, using empty default");
            Ok(T::default())
        }
    }
}

/// Reject empty credentials before any browser is started.
pub fn validate_credentials(credentials: &Credentials) -> Result<(), ScrapeError> {
    if credentials.username.trim().is_empty() {
        return Err(ScrapeError::InvalidInput("username is required".to_string()));
    }
    if credentials.password.is_empty() {
        return Err(ScrapeError::InvalidInput("password is required".to_string()));
    }
    Ok(())
}

/// Evenly spaced checkpoints between sign-in and finalize.
fn step_percent(index: usize, count: usize) -> u8 {
    let span = (FINALIZE_PERCENT - LOGGED_IN_PERCENT) as usize;
    (LOGGED_IN_PERCENT as usize + span * (index + 1) / (count + 1)) as u8
}
