// src/value.rs
//! Typed cell values produced by table ingestion.
//!
//! Every cell is classified exactly once when its table is loaded and is
//! consumed uniformly afterwards by context assembly and the render
//! filters. Downstream code never re-sniffs strings.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder substituted for null/missing cells during context assembly.
pub const NULL_SENTINEL: &str = "—";

/// Datetime formats recognized by date detection, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Date-only formats; parsed values land at midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

/// A single spreadsheet cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CellValue {
    Date(NaiveDateTime),
    Number(f64),
    Text(String),
    Null,
}

impl CellValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Date(_) => "date",
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Number(_))
    }

    /// Human-readable form. Whole numbers drop their fraction, dates use
    /// day-first notation, and `Null` renders as the sentinel.
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::Date(dt) => smart_datetime_string(dt, true),
            CellValue::Number(n) => display_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Null => NULL_SENTINEL.to_string(),
        }
    }

    /// Numeric view: numbers directly, numeric text parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Date view: dates directly, date-like text parsed.
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(dt) => Some(*dt),
            CellValue::Text(s) => parse_date_like(s),
            _ => None,
        }
    }

    /// JSON view with dates as ISO-8601 strings, for renderers that
    /// consume serialized contexts.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Date(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(n.to_string())),
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Null => serde_json::Value::Null,
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Date(a), CellValue::Date(b)) => a == b,
            (CellValue::Number(a), CellValue::Number(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Null, CellValue::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Number(i as f64)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::Date(dt)
    }
}

/// Parse a string against the recognized datetime and date formats.
pub(crate) fn parse_date_like(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.len() < 8 || trimmed.len() > 26 {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Day-first rendering that degrades with the precision actually present:
/// midnight renders date-only and zero seconds drop the seconds field.
pub(crate) fn smart_datetime_string(dt: &NaiveDateTime, with_seconds: bool) -> String {
    let time = dt.time();
    if time.hour() == 0 && time.minute() == 0 && time.second() == 0 {
        dt.format("%d.%m.%Y").to_string()
    } else if with_seconds && time.second() != 0 {
        dt.format("%d.%m.%Y %H:%M:%S").to_string()
    } else {
        dt.format("%d.%m.%Y %H:%M").to_string()
    }
}

fn display_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
