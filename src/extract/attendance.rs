//! Attendance marks, counted per course from event-cell tooltips.
//!
//! Each marked cell carries a title of the form
//! `"<course code>; <mark label> / <lesson details>"`.

use html_scraper::{Html, Selector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::ExtractError;
use crate::config::TimeoutConfig;
use crate::portal::PortalSession;
use crate::portal::layout::selectors;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::ATTENDANCE_TABLE).unwrap());
static MARK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::ATTENDANCE_MARK).unwrap());

/// The only mark labels that are counted. Everything else is ignored.
pub const MARK_ALLOW_LIST: [&str; 3] = [
    "Terveydelliset syyt",
    "Selvitetty luvaton poissaolo",
    "Myöhässä alle 15 min",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub code: String,
    pub marks: BTreeMap<String, u32>,
}

impl AttendanceRecord {
    pub fn total(&self) -> u32 {
        self.marks.values().sum()
    }
}

pub async fn fetch(
    session: &mut dyn PortalSession,
    timeouts: &TimeoutConfig,
) -> Result<Vec<AttendanceRecord>, ExtractError> {
    session
        .wait_for(selectors::ATTENDANCE_TABLE, timeouts.selector)
        .await?;
    let html = session.html().await?;
    parse(&Html::parse_document(&html))
}

/// Records in first-seen course order. Courses with no counted marks are left out.
pub fn parse(document: &Html) -> Result<Vec<AttendanceRecord>, ExtractError> {
    if document.select(&TABLE).next().is_none() {
        return Err(ExtractError::MissingElement("attendance table"));
    }

    let mut by_course: IndexMap<String, BTreeMap<String, u32>> = IndexMap::new();
    for cell in document.select(&MARK) {
        let Some(title) = cell.value().attr("title") else {
            continue;
        };
        let Some((code, label)) = split_title(title) else {
            continue;
        };
        if !MARK_ALLOW_LIST.contains(&label) {
            continue;
        }
        *by_course
            .entry(code.to_string())
            .or_default()
            .entry(label.to_string())
            .or_default() += 1;
    }

    Ok(by_course
        .into_iter()
        .map(|(code, marks)| AttendanceRecord { code, marks })
        .collect())
}

/// `"MAA02; Myöhässä alle 15 min / ma 3.9. klo 8:15"` -> `("MAA02", "Myöhässä alle 15 min")`
fn split_title(title: &str) -> Option<(&str, &str)> {
    let (code, rest) = title.split_once(';')?;
    let label = rest.split('/').next().unwrap_or(rest);
    let (code, label) = (code.trim(), label.trim());
    if code.is_empty() || label.is_empty() {
        return None;
    }
    Some((code, label))
}
