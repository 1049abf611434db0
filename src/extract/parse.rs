//! Locale-aware normalization of portal text: Finnish decimals and dates,
//! grade tokens, and course-code keys.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+(?:[.,]\d+)?$").unwrap());
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").unwrap());
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Parse a number that may use a comma as the decimal separator (`"8,5"`).
///
/// Interior whitespace (including non-breaking spaces used as thousands
/// separators) is ignored. Anything else that is not a plain decimal yields `None`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if !DECIMAL_RE.is_match(&compact) {
        return None;
    }
    compact.replace(',', ".").parse::<f64>().ok()
}

/// A grade cell: the text as shown, plus its numeric value when it has one.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGrade {
    pub raw: String,
    pub value: Option<f64>,
}

/// `"8,5"` is numeric 8.5, `"S"` is a literal pass mark, `""` is no grade.
pub fn parse_grade(raw: &str) -> Option<ParsedGrade> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Some(ParsedGrade {
        raw: raw.to_string(),
        value: parse_decimal(raw),
    })
}

/// Parse a `D.M.YYYY` date. Impossible calendar dates yield `None`.
pub fn parse_fi_date(raw: &str) -> Option<NaiveDate> {
    let caps = DATE_RE.captures(raw.trim())?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Join key for course codes across views: all whitespace removed, lower-cased.
pub fn normalize_course_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// First run of ASCII digits in `text`.
pub fn first_number(text: &str) -> Option<u32> {
    DIGITS_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Collapse runs of whitespace and trim; empty text becomes `None`.
pub fn clean_text(raw: &str) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_accepts_comma_and_dot() {
        assert_eq!(parse_decimal("8,5"), Some(8.5));
        assert_eq!(parse_decimal("7.25"), Some(7.25));
        assert_eq!(parse_decimal(" 10 "), Some(10.0));
        assert_eq!(parse_decimal("1\u{a0}234,5"), Some(1234.5));
    }

    #[test]
    fn decimal_rejects_words() {
        assert_eq!(parse_decimal("S"), None);
        assert_eq!(parse_decimal("inf"), None);
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("8-"), None);
    }

    #[test]
    fn grade_numeric_literal_and_empty() {
        assert_eq!(
            parse_grade("8,5"),
            Some(ParsedGrade {
                raw: "8,5".to_string(),
                value: Some(8.5)
            })
        );
        assert_eq!(
            parse_grade("S"),
            Some(ParsedGrade {
                raw: "S".to_string(),
                value: None
            })
        );
        assert_eq!(parse_grade(""), None);
        assert_eq!(parse_grade("   "), None);
    }

    #[test]
    fn fi_date_normalizes_to_iso() {
        let date = parse_fi_date("3.9.2025").unwrap();
        assert_eq!(date.to_string(), "2025-09-03");
        assert_eq!(
            parse_fi_date("31.12.2024").map(|d| d.to_string()),
            Some("2024-12-31".to_string())
        );
    }

    #[test]
    fn fi_date_rejects_invalid() {
        assert_eq!(parse_fi_date("45.1.2025"), None);
        assert_eq!(parse_fi_date("29.2.2025"), None);
        assert_eq!(parse_fi_date("2025-09-03"), None);
        assert_eq!(parse_fi_date(""), None);
    }

    #[test]
    fn course_codes_normalize() {
        assert_eq!(normalize_course_code("BG04 "), "bg04");
        assert_eq!(normalize_course_code("bg04"), "bg04");
        assert_eq!(normalize_course_code(" MAA 12\t"), "maa12");
    }

    #[test]
    fn first_number_finds_digits() {
        assert_eq!(first_number("12 uutta"), Some(12));
        assert_eq!(first_number("(3)"), Some(3));
        assert_eq!(first_number("none"), None);
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(
            clean_text("  Maija \n  Meikäläinen "),
            Some("Maija Meikäläinen".to_string())
        );
        assert_eq!(clean_text(" \u{a0} "), None);
    }
}
