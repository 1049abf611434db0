//! Events pushed to job subscribers.

use serde::{Deserialize, Serialize};

use crate::scrape::{ErrorKind, Phase, ScrapeError, ScrapeResult};

/// One frame on a job's progress channel.
///
/// `done` and `error` are terminal: nothing follows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum ProgressEvent {
    Progress {
        percent: u8,
        phase: Phase,
        message: String,
    },
    Done {
        percent: u8,
        phase: Phase,
        message: String,
        result: Box<ScrapeResult>,
    },
    Error {
        percent: u8,
        phase: Phase,
        message: String,
        error_kind: ErrorKind,
        details: String,
        status_hint: u16,
    },
}

impl ProgressEvent {
    pub fn progress(percent: u8, phase: Phase, message: impl Into<String>) -> Self {
        ProgressEvent::Progress {
            percent: percent.min(100),
            phase,
            message: message.into(),
        }
    }

    pub fn queued() -> Self {
        Self::progress(2, Phase::Queued, "Waiting to start")
    }

    pub fn done(result: ScrapeResult) -> Self {
        ProgressEvent::Done {
            percent: 100,
            phase: Phase::Done,
            message: "Scrape complete".to_string(),
            result: Box::new(result),
        }
    }

    /// Terminal error frame. The percent is raised to the job's last value on push.
    pub fn failed(err: &ScrapeError) -> Self {
        ProgressEvent::Error {
            percent: 0,
            phase: Phase::Error,
            message: err.user_message(),
            error_kind: err.kind(),
            details: err.details(),
            status_hint: err.status_hint(),
        }
    }

    pub fn percent(&self) -> u8 {
        match self {
            ProgressEvent::Progress { percent, .. }
            | ProgressEvent::Done { percent, .. }
            | ProgressEvent::Error { percent, .. } => *percent,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            ProgressEvent::Progress { phase, .. }
            | ProgressEvent::Done { phase, .. }
            | ProgressEvent::Error { phase, .. } => *phase,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progress { .. })
    }

    /// Lift the percent to at least `floor`.
    pub(crate) fn raise_percent(&mut self, floor: u8) {
        match self {
            ProgressEvent::Progress { percent, .. }
            | ProgressEvent::Done { percent, .. }
            | ProgressEvent::Error { percent, .. } => *percent = (*percent).max(floor),
        }
    }
}
