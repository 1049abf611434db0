//! ECTS credit summary: credits per course-type category and school year.

use html_scraper::{ElementRef, Html, Selector};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::{ExtractError, element_text, parse};
use crate::config::TimeoutConfig;
use crate::portal::PortalSession;
use crate::portal::layout::selectors;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::CREDIT_TABLE).unwrap());
static HEADER_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::CREDIT_HEADER_CELL).unwrap());
static BODY_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::CREDIT_BODY_ROW).unwrap());
static FOOTER_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::CREDIT_FOOTER_ROW).unwrap());
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(selectors::CREDIT_CELL).unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EctsCategory {
    pub category: String,
    pub by_year: IndexMap<String, f64>,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EctsSummary {
    pub years: Vec<String>,
    pub rows: Vec<EctsCategory>,
    pub by_year: IndexMap<String, f64>,
    pub total: f64,
}

pub async fn fetch(
    session: &mut dyn PortalSession,
    timeouts: &TimeoutConfig,
) -> Result<EctsSummary, ExtractError> {
    session
        .wait_for(selectors::CREDIT_TABLE, timeouts.selector)
        .await?;
    let html = session.html().await?;
    parse(&Html::parse_document(&html))
}

pub fn parse(document: &Html) -> Result<EctsSummary, ExtractError> {
    if document.select(&TABLE).next().is_none() {
        return Err(ExtractError::MissingElement("credit summary table"));
    }

    // First header cell names the category column, the last one the totals.
    let headers: Vec<String> = document
        .select(&HEADER_CELL)
        .map(|th| element_text(th).unwrap_or_default())
        .collect();
    let years: Vec<String> = match headers.len() {
        0..=2 => Vec::new(),
        n => headers[1..n - 1].to_vec(),
    };

    let rows: Vec<EctsCategory> = document
        .select(&BODY_ROW)
        .filter_map(|row| read_row(row, &years))
        .collect();

    let (by_year, total) = match document.select(&FOOTER_ROW).next() {
        Some(footer) => {
            let cells = cell_texts(footer);
            let by_year = year_values(&cells, &years);
            let total = total_cell(&cells, &years);
            (by_year, total)
        }
        None => {
            let by_year: IndexMap<String, f64> = years
                .iter()
                .map(|year| {
                    let sum: f64 = rows.iter().filter_map(|r| r.by_year.get(year)).sum();
                    (year.clone(), sum)
                })
                .collect();
            let total: f64 = by_year.values().sum();
            (by_year, total)
        }
    };

    Ok(EctsSummary {
        years,
        rows,
        by_year,
        total,
    })
}

fn read_row(row: ElementRef<'_>, years: &[String]) -> Option<EctsCategory> {
    let cells = cell_texts(row);
    let category = cells.first().filter(|c| !c.is_empty())?.clone();
    let by_year = year_values(&cells, years);
    let total = total_cell(&cells, years);
    Some(EctsCategory {
        category,
        by_year,
        total,
    })
}

fn cell_texts(row: ElementRef<'_>) -> Vec<String> {
    row.select(&CELL)
        .map(|cell| element_text(cell).unwrap_or_default())
        .collect()
}

/// The last column; blank or unparseable counts as 0.
fn total_cell(cells: &[String], years: &[String]) -> f64 {
    cells
        .get(years.len() + 1)
        .and_then(|raw| parse::parse_decimal(raw))
        .unwrap_or(0.0)
}

/// Cells after the label column, one per year; unparseable values count as 0.
fn year_values(cells: &[String], years: &[String]) -> IndexMap<String, f64> {
    years
        .iter()
        .enumerate()
        .map(|(i, year)| {
            let value = cells
                .get(i + 1)
                .and_then(|raw| parse::parse_decimal(raw))
                .unwrap_or(0.0);
            (year.clone(), value)
        })
        .collect()
}
