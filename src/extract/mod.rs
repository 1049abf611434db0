//! View extractors: turn one loaded portal view into typed records.
//!
//! Every extractor has two halves: an async `fetch` that waits on the live
//! session and pulls the document, and a pure `parse` over the parsed HTML.
//! Extractors report failures as [`ExtractError`]; the pipeline decides to
//! discard them in favour of the type's empty default.

pub mod attendance;
pub mod ects;
pub mod gradebook;
pub mod parse;
pub mod profile;
pub mod unread;

pub use attendance::{AttendanceRecord, MARK_ALLOW_LIST};
pub use ects::{EctsCategory, EctsSummary};
pub use gradebook::{Gradebook, GradebookCourse, SubjectGrades};
pub use profile::UserProfile;

use html_scraper::{ElementRef, Selector};

use crate::portal::PortalError;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error("expected element missing: {0}")]
    MissingElement(&'static str),
    #[error("could not parse {what}: {raw:?}")]
    Parse { what: &'static str, raw: String },
}

impl ExtractError {
    /// The browser session is gone; no later view can succeed either.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, ExtractError::Portal(e) if e.is_session_lost())
    }
}

/// Whitespace-collapsed text of the first `selector` match under `el`.
fn cell_text(el: ElementRef<'_>, selector: &Selector) -> Option<String> {
    el.select(selector)
        .next()
        .and_then(|cell| parse::clean_text(&cell.text().collect::<String>()))
}

fn element_text(el: ElementRef<'_>) -> Option<String> {
    parse::clean_text(&el.text().collect::<String>())
}
