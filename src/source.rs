// src/source.rs
//! Typed table ingestion.
//!
//! `TableSource` reads one raw table through a [`TabularFileReader`] and
//! produces an immutable [`Relation`] whose columns carry an inferred
//! kind. Classification looks at a bounded sample of each column plus
//! header hints, so a stray value past the sample window changes a single
//! cell, never the whole column.

use crate::reader::{RawTable, ReadError, TabularFileReader};
use crate::value::{CellValue, parse_date_like};
use std::path::Path;

/// Number of non-empty values sampled per column during classification.
const SAMPLE_SIZE: usize = 10;

/// Header fragments that mark a column as date-typed when at least one
/// sampled value parses as a date.
const DATE_HEADER_HINTS: &[&str] = &["date", "дата"];

/// Inferred semantic kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Values parse as dates; unparseable cells fall back to text.
    Date,
    /// Text preserved verbatim (leading-zero codes, text-formatted cells).
    Text,
    /// No column-wide ruling; each cell is classified on its own.
    Inferred,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// An immutable, fully typed in-memory table. Rows always match the
/// column count.
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<CellValue>>,
}

impl Relation {
    /// Build a relation from already-typed parts. Rows are padded with
    /// `Null` or truncated to the column count.
    pub fn from_parts(
        name: impl Into<String>,
        columns: Vec<Column>,
        rows: Vec<Vec<CellValue>>,
    ) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();
        Self { name: name.into(), columns, rows }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Index of a column by name; the lookup normalizes its argument, so
    /// raw headers match too.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = normalize_column_name(name);
        self.columns.iter().position(|c| c.name == wanted)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let column = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Normalize a header: trim surrounding whitespace and case-fold.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Relation name for a file path: the stem, case-folded.
pub(crate) fn relation_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

/// Loads one tabular file through a reader and types it.
pub struct TableSource<'a> {
    reader: &'a dyn TabularFileReader,
}

impl<'a> TableSource<'a> {
    pub fn new(reader: &'a dyn TabularFileReader) -> Self {
        Self { reader }
    }

    /// Read and type one file. The relation is named by file stem.
    pub fn load(&self, path: &Path) -> Result<Relation, ReadError> {
        let raw = self.reader.read(path)?;
        Ok(build_relation(relation_name(path), raw))
    }
}

fn build_relation(name: String, raw: RawTable) -> Relation {
    let names = dedup_column_names(&raw);
    let columns: Vec<Column> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let kind = classify_column(&name, raw.columns[i].text_hint, &sample_column(&raw.rows, i));
            Column { name, kind }
        })
        .collect();

    let rows = raw
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, column)| parse_cell(row.get(i).and_then(|c| c.as_deref()), column.kind))
                .collect()
        })
        .collect();

    Relation { name, columns, rows }
}

/// Normalized header names with duplicates suffixed `_2`, `_3`, ...
fn dedup_column_names(raw: &RawTable) -> Vec<String> {
    let mut seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    raw.columns
        .iter()
        .map(|column| {
            let base = normalize_column_name(&column.name);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 { base } else { format!("{}_{}", base, count) }
        })
        .collect()
}

fn sample_column<'r>(rows: &'r [Vec<Option<String>>], index: usize) -> Vec<&'r str> {
    rows.iter()
        .filter_map(|row| row.get(index).and_then(|cell| cell.as_deref()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(SAMPLE_SIZE)
        .collect()
}

fn classify_column(name: &str, text_hint: bool, sample: &[&str]) -> ColumnKind {
    if text_hint {
        return ColumnKind::Text;
    }
    if !sample.is_empty() {
        if sample.iter().all(|v| is_leading_zero_number(v)) {
            return ColumnKind::Text;
        }
        if sample.iter().all(|v| parse_date_like(v).is_some()) {
            return ColumnKind::Date;
        }
        if DATE_HEADER_HINTS.iter().any(|hint| name.contains(hint))
            && sample.iter().any(|v| parse_date_like(v).is_some())
        {
            return ColumnKind::Date;
        }
    }
    ColumnKind::Inferred
}

/// Digit strings with a leading zero ("00123") are identifiers, not
/// numbers.
fn is_leading_zero_number(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('0') && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_cell(cell: Option<&str>, kind: ColumnKind) -> CellValue {
    let Some(text) = cell else {
        return CellValue::Null;
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return CellValue::Null;
    }
    match kind {
        ColumnKind::Text => CellValue::Text(text.to_string()),
        ColumnKind::Date => parse_date_like(trimmed)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(text.to_string())),
        ColumnKind::Inferred => infer_cell(text, trimmed),
    }
}

fn infer_cell(original: &str, trimmed: &str) -> CellValue {
    if is_leading_zero_number(trimmed) {
        return CellValue::Text(original.to_string());
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return CellValue::Number(int as f64);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        return CellValue::Number(float);
    }
    CellValue::Text(original.to_string())
}
