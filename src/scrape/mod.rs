//! Scrape pipeline: sign in, visit the views a mode asks for, and fold the
//! extracted data into one [`ScrapeResult`].

mod errors;
mod merge;
mod pipeline;

pub use errors::{ErrorKind, ScrapeError};
pub use merge::merge_attendance;
pub use pipeline::{ScrapePipeline, validate_credentials};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::extract::{AttendanceRecord, EctsSummary, Gradebook, UserProfile};

/// Which views a scrape visits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    #[default]
    All,
    Unread,
    Grades,
    Attendance,
}

impl ScrapeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeMode::All => "all",
            ScrapeMode::Unread => "unread",
            ScrapeMode::Grades => "grades",
            ScrapeMode::Attendance => "attendance",
        }
    }

    /// Fetch steps in execution order.
    fn steps(self) -> &'static [Step] {
        match self {
            ScrapeMode::All => &[Step::Profile, Step::Unread, Step::Grades, Step::Attendance],
            ScrapeMode::Unread => &[Step::Unread],
            ScrapeMode::Grades => &[Step::Grades],
            ScrapeMode::Attendance => &[Step::Attendance],
        }
    }
}

impl fmt::Display for ScrapeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapeMode {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(ScrapeMode::All),
            "unread" => Ok(ScrapeMode::Unread),
            "grades" => Ok(ScrapeMode::Grades),
            "attendance" => Ok(ScrapeMode::Attendance),
            other => Err(ScrapeError::InvalidInput(format!(
                "unknown mode {other:?}, expected all, unread, grades or attendance"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Profile,
    Unread,
    Grades,
    Attendance,
}

/// Progress checkpoint reported alongside a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Queued,
    Login,
    LoginSuccess,
    Profile,
    Unread,
    Grades,
    Attendance,
    Finalize,
    Done,
    Error,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Queued => "queued",
            Phase::Login => "login",
            Phase::LoginSuccess => "login-success",
            Phase::Profile => "profile",
            Phase::Unread => "unread",
            Phase::Grades => "grades",
            Phase::Attendance => "attendance",
            Phase::Finalize => "finalize",
            Phase::Done => "done",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives non-terminal progress checkpoints from a running pipeline.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8, phase: Phase, message: &str);
}

/// Discards progress; used by run-and-wait.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _phase: Phase, _message: &str) {}
}

/// Aggregate output of one scrape. Fields a mode does not cover are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_messages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradebook: Option<Gradebook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ects: Option<EctsSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance: Option<Vec<AttendanceRecord>>,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapeResult {
    pub fn empty() -> Self {
        Self {
            unread_messages: None,
            profile: None,
            gradebook: None,
            ects: None,
            attendance: None,
            scraped_at: Utc::now(),
        }
    }
}
