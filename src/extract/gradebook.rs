//! Gradebook: completed course units with their curriculum hierarchy.
//!
//! The portal renders the whole study plan as one flat table. Nesting is
//! encoded in a `levelN` class on each row, so the hierarchy is rebuilt by
//! walking rows top to bottom and tracking the current label at each depth.

use chrono::NaiveDate;
use html_scraper::{ElementRef, Html, Selector};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use super::{ExtractError, cell_text, parse};
use crate::config::TimeoutConfig;
use crate::portal::PortalSession;
use crate::portal::layout::selectors;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::GRADEBOOK_TABLE).unwrap());
static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::GRADEBOOK_ROW).unwrap());
static CODE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(selectors::CELL_CODE).unwrap());
static NAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse(selectors::CELL_NAME).unwrap());
static GRADE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::CELL_GRADE).unwrap());
static CREDITS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::CELL_CREDITS).unwrap());
static DATE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(selectors::CELL_DATE).unwrap());
static TEACHER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::CELL_TEACHER).unwrap());

static LEVEL_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^level(\d+)$").unwrap());

/// Deepest nesting the portal has been seen to render, with headroom.
const MAX_LEVEL: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradebookCourse {
    pub code: String,
    pub name: Option<String>,
    pub curriculum: Option<String>,
    pub subject: Option<String>,
    pub track: Option<String>,
    /// Ancestor labels, root first, excluding the course itself.
    pub hierarchy: Vec<String>,
    /// Always `hierarchy.len() + 1`.
    pub level: usize,
    pub grade: Option<String>,
    pub grade_value: Option<f64>,
    pub credits: Option<f64>,
    pub completed_raw: Option<String>,
    /// Serialized as `YYYY-MM-DD`.
    pub completed_on: Option<NaiveDate>,
    pub teacher: Option<String>,
    #[serde(default)]
    pub attendance: BTreeMap<String, u32>,
    #[serde(default)]
    pub attendance_total: u32,
}

/// Numeric grades grouped under one subject label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGrades {
    pub name: String,
    pub grades: Vec<f64>,
    pub average: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gradebook {
    pub courses: Vec<GradebookCourse>,
    pub subjects: Vec<SubjectGrades>,
}

impl Gradebook {
    pub fn from_courses(courses: Vec<GradebookCourse>) -> Self {
        let subjects = group_subjects(&courses);
        Self { courses, subjects }
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

/// Wait for the table, expand every collapsed group, then parse.
pub async fn fetch(
    session: &mut dyn PortalSession,
    timeouts: &TimeoutConfig,
) -> Result<Gradebook, ExtractError> {
    session
        .wait_for(selectors::GRADEBOOK_TABLE, timeouts.selector)
        .await?;

    if session.is_visible(selectors::GRADEBOOK_EXPAND_ALL).await? {
        session.click(selectors::GRADEBOOK_EXPAND_ALL).await?;
        match session
            .wait_until_absent(selectors::GRADEBOOK_COLLAPSED_ROW, timeouts.expand)
            .await
        {
            Ok(()) => {}
            // Rows that never expand are still present in the DOM, just hidden.
            Err(e) if e.is_timeout() => debug!(error = %e, "gradebook did not fully expand"),
            Err(e) => return Err(e.into()),
        }
    }

    let html = session.html().await?;
    parse(&Html::parse_document(&html))
}

pub fn parse(document: &Html) -> Result<Gradebook, ExtractError> {
    if document.select(&TABLE).next().is_none() {
        return Err(ExtractError::MissingElement("gradebook table"));
    }

    let mut ancestors = AncestorLabels::default();
    let mut courses = Vec::new();

    for row in document.select(&ROW) {
        let depth = row_level(row);
        let code = cell_text(row, &CODE);
        let name = cell_text(row, &NAME);
        let label = name.clone().or_else(|| code.clone());

        // Ancestors must be read before this row replaces its own level.
        let chain = ancestors.chain(depth);
        ancestors.set(depth, label);

        let Some(code) = code else { continue };
        let grade = cell_text(row, &GRADE).and_then(|raw| parse::parse_grade(&raw));
        let completed_raw = cell_text(row, &DATE);
        if grade.is_none() && completed_raw.is_none() {
            continue;
        }

        let placement = Placement::locate(depth, &chain, &ancestors);
        courses.push(GradebookCourse {
            code,
            name,
            curriculum: placement.curriculum,
            subject: placement.subject,
            track: placement.track,
            level: chain.len() + 1,
            hierarchy: chain.into_iter().map(|(_, label)| label).collect(),
            grade_value: grade.as_ref().and_then(|g| g.value),
            grade: grade.map(|g| g.raw),
            credits: cell_text(row, &CREDITS).and_then(|raw| parse::parse_decimal(&raw)),
            completed_on: completed_raw.as_deref().and_then(parse::parse_fi_date),
            completed_raw,
            teacher: cell_text(row, &TEACHER),
            ..Default::default()
        });
    }

    Ok(Gradebook::from_courses(courses))
}

/// Depth from the row's `levelN` class. Unmarked rows sit at the root.
fn row_level(row: ElementRef<'_>) -> usize {
    row.value()
        .classes()
        .find_map(|class| {
            LEVEL_CLASS
                .captures(class)
                .and_then(|caps| caps[1].parse::<usize>().ok())
        })
        .unwrap_or(1)
        .clamp(1, MAX_LEVEL)
}

/// Current label at each depth, indexed from 1.
#[derive(Default)]
struct AncestorLabels {
    labels: Vec<Option<String>>,
}

impl AncestorLabels {
    /// Record `label` at `depth` and forget everything deeper.
    fn set(&mut self, depth: usize, label: Option<String>) {
        self.labels.resize(depth + 1, None);
        self.labels[depth] = label;
    }

    /// Non-empty `(depth, label)` pairs above `depth`, root first.
    fn chain(&self, depth: usize) -> Vec<(usize, String)> {
        self.labels
            .iter()
            .enumerate()
            .take(depth)
            .skip(1)
            .filter_map(|(level, label)| label.clone().map(|l| (level, l)))
            .collect()
    }

    fn at(&self, depth: usize) -> Option<String> {
        self.labels.get(depth).cloned().flatten()
    }
}

struct Placement {
    curriculum: Option<String>,
    subject: Option<String>,
    track: Option<String>,
}

impl Placement {
    /// `chain` is the row's ancestry; `labels` already holds the row's own
    /// label at `depth`, so a root row is its own curriculum.
    fn locate(depth: usize, chain: &[(usize, String)], labels: &AncestorLabels) -> Self {
        let parent = chain.last().map(|(_, label)| label.clone());
        let curriculum = labels.at(1);

        let subject = if depth >= 3 {
            labels.at(2).or(parent)
        } else {
            parent.or_else(|| curriculum.clone())
        };
        let track = if depth >= 4 { labels.at(3) } else { None };

        Self {
            curriculum,
            subject,
            track,
        }
    }
}

/// Numeric grades per subject in first-seen order. Literal marks are skipped.
fn group_subjects(courses: &[GradebookCourse]) -> Vec<SubjectGrades> {
    let mut groups: IndexMap<&str, Vec<f64>> = IndexMap::new();
    for course in courses {
        let Some(value) = course.grade_value else {
            continue;
        };
        let key = course
            .subject
            .as_deref()
            .or(course.name.as_deref())
            .unwrap_or(&course.code);
        groups.entry(key).or_default().push(value);
    }

    groups
        .into_iter()
        .map(|(name, grades)| {
            let average = grades.iter().sum::<f64>() / grades.len() as f64;
            SubjectGrades {
                name: name.to_string(),
                grades,
                average,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &str) -> Html {
        Html::parse_document(&format!(
            r#"<table id="gradebook"><tbody>{rows}</tbody></table>"#
        ))
    }

    fn row(level: usize, code: &str, name: &str, grade: &str, date: &str) -> String {
        format!(
            r#"<tr class="level{level}"><td class="code">{code}</td><td class="name">{name}</td><td class="grade">{grade}</td><td class="credits">2</td><td class="date">{date}</td><td class="teacher">Opettaja</td></tr>"#
        )
    }

    fn sample() -> Html {
        table(
            &[
                row(1, "", "Lukion opetussuunnitelma", "", ""),
                row(2, "", "Matematiikka", "", ""),
                row(3, "", "Pitkä matematiikka", "", ""),
                row(4, "MAA02", "Funktiot", "8,5", "3.9.2025"),
                row(4, "MAA03", "Geometria", "7", ""),
                row(2, "", "Äidinkieli", "", ""),
                row(3, "ÄI01", "Tekstit", "S", "45.1.2025"),
                row(3, "ÄI02", "Kieli", "", ""),
                row(1, "OP01", "Opinto-ohjaus", "", "12.5.2025"),
            ]
            .concat(),
        )
    }

    #[test]
    fn hierarchy_length_matches_level() {
        let book = parse(&sample()).unwrap();
        assert!(!book.courses.is_empty());
        for course in &book.courses {
            assert_eq!(course.hierarchy.len(), course.level - 1, "{}", course.code);
            assert!(course.hierarchy.iter().all(|l| !l.is_empty()));
        }
    }

    #[test]
    fn deep_course_placement() {
        let book = parse(&sample()).unwrap();
        let maa02 = &book.courses[0];
        assert_eq!(maa02.code, "MAA02");
        assert_eq!(
            maa02.hierarchy,
            ["Lukion opetussuunnitelma", "Matematiikka", "Pitkä matematiikka"]
        );
        assert_eq!(maa02.curriculum.as_deref(), Some("Lukion opetussuunnitelma"));
        assert_eq!(maa02.subject.as_deref(), Some("Matematiikka"));
        assert_eq!(maa02.track.as_deref(), Some("Pitkä matematiikka"));
        assert_eq!(maa02.grade_value, Some(8.5));
        assert_eq!(maa02.completed_on, NaiveDate::from_ymd_opt(2025, 9, 3));
    }

    #[test]
    fn shallower_sibling_ends_deeper_lineage() {
        let book = parse(&sample()).unwrap();
        let ai01 = book.courses.iter().find(|c| c.code == "ÄI01").unwrap();
        assert_eq!(ai01.hierarchy, ["Lukion opetussuunnitelma", "Äidinkieli"]);
        assert_eq!(ai01.subject.as_deref(), Some("Äidinkieli"));
        assert_eq!(ai01.track, None);
    }

    #[test]
    fn literal_grade_and_invalid_date() {
        let book = parse(&sample()).unwrap();
        let ai01 = book.courses.iter().find(|c| c.code == "ÄI01").unwrap();
        assert_eq!(ai01.grade.as_deref(), Some("S"));
        assert_eq!(ai01.grade_value, None);
        assert_eq!(ai01.completed_raw.as_deref(), Some("45.1.2025"));
        assert_eq!(ai01.completed_on, None);
    }

    #[test]
    fn enrolled_course_is_not_emitted() {
        let book = parse(&sample()).unwrap();
        assert!(book.courses.iter().all(|c| c.code != "ÄI02"));
    }

    #[test]
    fn root_course_with_date_has_empty_hierarchy() {
        let book = parse(&sample()).unwrap();
        let op01 = book.courses.iter().find(|c| c.code == "OP01").unwrap();
        assert!(op01.hierarchy.is_empty());
        assert_eq!(op01.level, 1);
        assert_eq!(op01.curriculum.as_deref(), Some("Opinto-ohjaus"));
        assert_eq!(op01.subject.as_deref(), Some("Opinto-ohjaus"));
        assert_eq!(op01.grade, None);
    }

    #[test]
    fn graded_root_course_is_its_own_subject() {
        let rows = [
            row(1, "", "Ops", "", ""),
            row(2, "", "Matematiikka", "", ""),
            row(3, "MAB02", "Lausekkeet", "8", ""),
            row(1, "OP01", "Opinto-ohjaus", "9", ""),
        ]
        .concat();
        let book = parse(&table(&rows)).unwrap();

        let op01 = &book.courses[1];
        assert!(op01.hierarchy.is_empty());
        assert_eq!(op01.subject.as_deref(), Some("Opinto-ohjaus"));

        let names: Vec<&str> = book.subjects.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Matematiikka", "Opinto-ohjaus"]);
        assert_eq!(book.subjects[1].grades, [9.0]);
    }

    #[test]
    fn curriculum_comes_only_from_level_one() {
        let rows = [
            row(2, "", "Biologia", "", ""),
            row(3, "BI01", "Elämä ja evoluutio", "8", ""),
        ]
        .concat();
        let book = parse(&table(&rows)).unwrap();
        let bi01 = &book.courses[0];
        assert_eq!(bi01.curriculum, None);
        assert_eq!(bi01.subject.as_deref(), Some("Biologia"));
        assert_eq!(bi01.hierarchy, ["Biologia"]);
    }

    #[test]
    fn root_course_without_grade_or_date_is_skipped() {
        let book = parse(&table(&row(1, "XX01", "Kesken", "", ""))).unwrap();
        assert!(book.courses.is_empty());
    }

    #[test]
    fn skipped_level_keeps_hierarchy_consistent() {
        let rows = [
            row(1, "", "Ops", "", ""),
            row(3, "", "Ryhmä", "", ""),
            row(4, "KU01", "Kuvataide", "9", ""),
        ]
        .concat();
        let book = parse(&table(&rows)).unwrap();
        let ku01 = &book.courses[0];
        assert_eq!(ku01.hierarchy, ["Ops", "Ryhmä"]);
        assert_eq!(ku01.level, 3);
        // No level-2 label, so the immediate parent stands in.
        assert_eq!(ku01.subject.as_deref(), Some("Ryhmä"));
    }

    #[test]
    fn level_two_course_takes_parent_as_subject() {
        let rows = [
            row(1, "", "Ops", "", ""),
            row(2, "LI01", "Liikunta", "10", ""),
        ]
        .concat();
        let book = parse(&table(&rows)).unwrap();
        assert_eq!(book.courses[0].subject.as_deref(), Some("Ops"));
    }

    #[test]
    fn subjects_group_numeric_grades_in_first_seen_order() {
        let book = parse(&sample()).unwrap();
        assert_eq!(book.subjects.len(), 1);
        let math = &book.subjects[0];
        assert_eq!(math.name, "Matematiikka");
        assert_eq!(math.grades, [8.5, 7.0]);
        assert!((math.average - 7.75).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_table_is_an_error() {
        let doc = Html::parse_document("<p>Ei arvosanoja</p>");
        assert!(matches!(parse(&doc), Err(ExtractError::MissingElement(_))));
    }

    #[test]
    fn serializes_iso_date() {
        let book = parse(&sample()).unwrap();
        let json = serde_json::to_value(&book.courses[0]).unwrap();
        assert_eq!(json["completedOn"], "2025-09-03");
        assert_eq!(json["gradeValue"], 8.5);
    }
}
