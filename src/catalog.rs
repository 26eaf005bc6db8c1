// src/catalog.rs
//! Catalog discovery: one primary table plus every auxiliary table found
//! next to it.
//!
//! The primary table must load; a run without it is meaningless. Every
//! other readable table in the directory is auxiliary and optional: a
//! broken one is warned about and skipped so the run still proceeds.

use crate::error::GenerateError;
use crate::progress::ProgressReporter;
use crate::reader::{ReadError, TabularFileReader};
use crate::source::{Relation, TableSource, relation_name};
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;

/// All relations for one run. Auxiliaries are keyed by case-folded file
/// stem, which is also the name templates use to reach their rows.
#[derive(Debug, Clone)]
pub struct TableCatalog {
    primary: Relation,
    auxiliary: BTreeMap<String, Relation>,
}

impl TableCatalog {
    pub fn primary(&self) -> &Relation {
        &self.primary
    }

    pub fn auxiliary(&self) -> &BTreeMap<String, Relation> {
        &self.auxiliary
    }

    pub fn auxiliary_named(&self, name: &str) -> Option<&Relation> {
        self.auxiliary.get(name)
    }

    /// Load the primary file and every other table the reader supports
    /// from `directory`.
    pub fn load_all(
        directory: &Path,
        primary_file: &str,
        reader: &dyn TabularFileReader,
        reporter: &ProgressReporter,
    ) -> Result<Self, GenerateError> {
        let candidates = reader.list_directory(directory).map_err(|e| {
            GenerateError::Config(format!(
                "Source directory not readable: {}: {}",
                directory.display(),
                e
            ))
        })?;

        let source = TableSource::new(reader);
        let primary_path = directory.join(primary_file);
        let primary = source.load(&primary_path).map_err(|e| match e {
            ReadError::NotFound(_) => GenerateError::Config(format!(
                "Primary table not found: {}",
                primary_path.display()
            )),
            other => GenerateError::table(primary_file, other),
        })?;
        info!(
            "[CATALOG] Loaded primary table '{}' with {} record(s) via {}.",
            primary.name(),
            primary.row_count(),
            reader.name()
        );

        let mut auxiliary = BTreeMap::new();
        for path in candidates {
            if path.file_name().and_then(|name| name.to_str()) == Some(primary_file) {
                continue;
            }
            let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
                continue;
            };
            if !reader.supports_extension(&extension.to_lowercase()) {
                continue;
            }

            let name = relation_name(&path);
            if auxiliary.contains_key(&name) {
                warn!("[CATALOG] Duplicate table name '{}', keeping the first.", name);
                continue;
            }
            match source.load(&path) {
                Ok(relation) => {
                    debug!(
                        "[CATALOG] Loaded auxiliary table '{}' with {} row(s).",
                        name,
                        relation.row_count()
                    );
                    auxiliary.insert(name, relation);
                }
                Err(e) => {
                    reporter.warn(format!("Skipping table '{}': {}", name, e));
                }
            }
        }

        info!(
            "[CATALOG] {} auxiliary table(s): {}",
            auxiliary.len(),
            auxiliary.keys().join(", ")
        );
        Ok(Self { primary, auxiliary })
    }
}
