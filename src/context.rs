// src/context.rs
//! Per-record rendering contexts.
//!
//! The assembler turns one primary-table record plus the auxiliary tables
//! into a flat field map: every primary column lands under
//! `{column}_main` and every joinable auxiliary relation contributes its
//! matching rows under the relation's own name. Null cells are replaced
//! with the display sentinel here, so renderers never see holes.

use crate::catalog::TableCatalog;
use crate::error::GenerateError;
use crate::source::{Relation, normalize_column_name};
use crate::value::{CellValue, NULL_SENTINEL};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Suffix distinguishing primary-record fields from related-table entries.
pub const PRIMARY_FIELD_SUFFIX: &str = "_main";

/// A value in a rendering context: a single cell or the matched rows of
/// one auxiliary relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContextValue {
    Cell(CellValue),
    Rows(Vec<BTreeMap<String, CellValue>>),
}

impl ContextValue {
    pub fn as_cell(&self) -> Option<&CellValue> {
        match self {
            ContextValue::Cell(cell) => Some(cell),
            ContextValue::Rows(_) => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[BTreeMap<String, CellValue>]> {
        match self {
            ContextValue::Rows(rows) => Some(rows),
            ContextValue::Cell(_) => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            ContextValue::Cell(cell) => cell.to_json(),
            ContextValue::Rows(rows) => serde_json::Value::Array(
                rows.iter()
                    .map(|row| {
                        serde_json::Value::Object(
                            row.iter()
                                .map(|(name, cell)| (name.clone(), cell.to_json()))
                                .collect(),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

/// The flat field map a [`Renderer`](crate::render::Renderer) consumes
/// for one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordContext {
    fields: BTreeMap<String, ContextValue>,
}

impl RecordContext {
    pub fn insert(&mut self, name: impl Into<String>, value: ContextValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.fields.get(name)
    }

    /// Single-cell field, or `None` for related-rows entries.
    pub fn cell(&self, name: &str) -> Option<&CellValue> {
        self.fields.get(name).and_then(ContextValue::as_cell)
    }

    /// Related rows of one auxiliary relation.
    pub fn rows(&self, name: &str) -> Option<&[BTreeMap<String, CellValue>]> {
        self.fields.get(name).and_then(ContextValue::as_rows)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON view: dates become ISO-8601 strings and related rows become
    /// arrays of objects.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

/// Builds one context per primary record against a loaded catalog.
///
/// Construction validates the key column once; per-record assembly is
/// pure, so assembling the same record twice yields identical contexts.
#[derive(Debug)]
pub struct ContextAssembler<'a> {
    catalog: &'a TableCatalog,
    key_column: String,
    key_index: usize,
    /// Auxiliary relations carrying the key column, with its index.
    joinable: Vec<(&'a str, &'a Relation, usize)>,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(catalog: &'a TableCatalog, key_column: &str) -> Result<Self, GenerateError> {
        let key_column = normalize_column_name(key_column);
        let primary = catalog.primary();
        let key_index = primary.column_index(&key_column).ok_or_else(|| {
            GenerateError::Config(format!(
                "Key column '{}' not found in primary table '{}' (columns: {})",
                key_column,
                primary.name(),
                primary.column_names().join(", ")
            ))
        })?;

        let joinable = catalog
            .auxiliary()
            .iter()
            .filter_map(|(name, relation)| {
                relation
                    .column_index(&key_column)
                    .map(|index| (name.as_str(), relation, index))
            })
            .collect();

        Ok(Self { catalog, key_column, key_index, joinable })
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// The record's key value; `Null` when the row has none.
    pub fn key_value(&self, record_index: usize) -> CellValue {
        self.catalog
            .primary()
            .rows()
            .get(record_index)
            .and_then(|row| row.get(self.key_index))
            .cloned()
            .unwrap_or(CellValue::Null)
    }

    /// Assemble the context for one record.
    pub fn assemble(&self, record_index: usize) -> Result<RecordContext, GenerateError> {
        let primary = self.catalog.primary();
        let row = primary.rows().get(record_index).ok_or_else(|| {
            GenerateError::Other(format!(
                "record index {} out of range ({} records)",
                record_index,
                primary.row_count()
            ))
        })?;

        let mut context = RecordContext::default();
        for (column, value) in primary.columns().iter().zip(row) {
            context.insert(
                format!("{}{}", column.name, PRIMARY_FIELD_SUFFIX),
                ContextValue::Cell(or_sentinel(value)),
            );
        }

        let key = row.get(self.key_index).cloned().unwrap_or(CellValue::Null);
        for (name, relation, key_index) in &self.joinable {
            // A null key matches nothing; the entry is still present so
            // templates can iterate it unconditionally.
            let rows = relation
                .rows()
                .iter()
                .filter(|aux_row| {
                    !key.is_null() && aux_row.get(*key_index).is_some_and(|v| v == &key)
                })
                .map(|aux_row| materialize_row(relation, aux_row))
                .collect();
            context.insert((*name).to_string(), ContextValue::Rows(rows));
        }

        Ok(context)
    }
}

fn materialize_row(relation: &Relation, row: &[CellValue]) -> BTreeMap<String, CellValue> {
    relation
        .columns()
        .iter()
        .zip(row)
        .map(|(column, value)| (column.name.clone(), or_sentinel(value)))
        .collect()
}

fn or_sentinel(value: &CellValue) -> CellValue {
    match value {
        CellValue::Null => CellValue::Text(NULL_SENTINEL.to_string()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableCatalog;
    use crate::progress::ProgressReporter;
    use crate::reader::{InMemoryTableReader, RawTable};
    use std::path::Path;

    fn borrowers() -> RawTable {
        let mut table = RawTable::with_columns([" ID ", "Name", "Amount"]);
        table.push_str_row(&["1", "Іван Петров", "16500"]);
        table.push_str_row(&["2", "Ганна Ковальчук", ""]);
        table.push_str_row(&["3", "Олег Бондар", "900.5"]);
        table
    }

    fn payments() -> RawTable {
        let mut table = RawTable::with_columns(["id", "paid"]);
        table.push_str_row(&["1", "100"]);
        table.push_str_row(&["1", "200"]);
        table.push_str_row(&["2", "50"]);
        table.push_str_row(&["3", ""]);
        table.push_str_row(&["3", "75"]);
        table
    }

    fn notes() -> RawTable {
        // No key column: not joinable.
        let mut table = RawTable::with_columns(["text"]);
        table.push_str_row(&["hello"]);
        table
    }

    fn catalog() -> TableCatalog {
        let reader = InMemoryTableReader::new();
        reader.insert("borrowers.csv", borrowers()).unwrap();
        reader.insert("payments.csv", payments()).unwrap();
        reader.insert("notes.csv", notes()).unwrap();
        TableCatalog::load_all(
            Path::new("/virtual"),
            "borrowers.csv",
            &reader,
            &ProgressReporter::silent(),
        )
        .unwrap()
    }

    #[test]
    fn test_primary_fields_get_suffix() {
        let catalog = catalog();
        let assembler = ContextAssembler::new(&catalog, "id").unwrap();
        let context = assembler.assemble(0).unwrap();

        assert_eq!(context.cell("id_main"), Some(&CellValue::Number(1.0)));
        assert_eq!(
            context.cell("name_main"),
            Some(&CellValue::Text("Іван Петров".into()))
        );
        assert_eq!(context.cell("amount_main"), Some(&CellValue::Number(16500.0)));
    }

    #[test]
    fn test_join_counts_follow_key_distribution() {
        let catalog = catalog();
        let assembler = ContextAssembler::new(&catalog, "id").unwrap();

        let counts: Vec<usize> = (0..3)
            .map(|i| assembler.assemble(i).unwrap().rows("payments").unwrap().len())
            .collect();
        assert_eq!(counts, vec![2, 1, 2]);
    }

    #[test]
    fn test_unjoinable_relation_has_no_entry() {
        let catalog = catalog();
        let assembler = ContextAssembler::new(&catalog, "id").unwrap();
        let context = assembler.assemble(0).unwrap();

        assert!(context.get("notes").is_none());
        assert!(context.get("payments").is_some());
    }

    #[test]
    fn test_null_cells_become_sentinel() {
        let catalog = catalog();
        let assembler = ContextAssembler::new(&catalog, "id").unwrap();

        let context = assembler.assemble(1).unwrap();
        assert_eq!(
            context.cell("amount_main"),
            Some(&CellValue::Text(NULL_SENTINEL.into()))
        );

        let context = assembler.assemble(2).unwrap();
        let rows = context.rows("payments").unwrap();
        assert_eq!(rows[0]["paid"], CellValue::Text(NULL_SENTINEL.into()));
        assert_eq!(rows[1]["paid"], CellValue::Number(75.0));
    }

    #[test]
    fn test_aux_rows_carry_every_column() {
        let catalog = catalog();
        let assembler = ContextAssembler::new(&catalog, "id").unwrap();
        let context = assembler.assemble(1).unwrap();

        let rows = context.rows("payments").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], CellValue::Number(2.0));
        assert_eq!(rows[0]["paid"], CellValue::Number(50.0));
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let catalog = catalog();
        let assembler = ContextAssembler::new(&catalog, "id").unwrap();
        let first = assembler.assemble(0).unwrap();
        let second = assembler.assemble(0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_key_column_is_config_error() {
        let catalog = catalog();
        let err = ContextAssembler::new(&catalog, "account").unwrap_err();
        assert!(matches!(err, GenerateError::Config(_)));
        assert!(err.to_string().contains("account"));
    }

    #[test]
    fn test_key_lookup_normalizes_name() {
        let catalog = catalog();
        // Primary header was " ID "; lookup with raw casing and padding still works.
        let assembler = ContextAssembler::new(&catalog, "ID").unwrap();
        assert_eq!(assembler.key_column(), "id");
        assert_eq!(assembler.key_value(2), CellValue::Number(3.0));
    }

    #[test]
    fn test_context_json_shape() {
        let catalog = catalog();
        let assembler = ContextAssembler::new(&catalog, "id").unwrap();
        let json = assembler.assemble(0).unwrap().to_json();

        assert_eq!(json["id_main"], serde_json::json!(1.0));
        assert_eq!(json["payments"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["payments"][0]["paid"], serde_json::json!(100.0));
    }
}
