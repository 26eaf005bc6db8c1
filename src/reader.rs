// src/reader.rs
//! Raw tabular file access.
//!
//! `TabularFileReader` keeps the on-disk format out of the engine:
//! implementations hand back untyped string cells and the source layer
//! runs type inference on top. Two implementations ship here: a CSV/TSV
//! reader (behind the `csv` feature) and an in-memory reader for tests
//! and embedders that already hold their rows.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Errors produced while reading one tabular file.
#[derive(Error, Debug, Clone)]
pub enum ReadError {
    #[error("Table not found: {0}")]
    NotFound(String),
    #[error("Failed to read table '{path}': {message}")]
    Malformed { path: String, message: String },
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        ReadError::Io(err.to_string())
    }
}

/// One untyped column as read from disk.
#[derive(Debug, Clone, Default)]
pub struct RawColumn {
    pub name: String,
    /// Set when the source format marks the column as text (a text cell
    /// format, for instance), which suppresses numeric coercion later.
    pub text_hint: bool,
}

impl RawColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), text_hint: false }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self { name: name.into(), text_hint: true }
    }
}

/// An untyped table: named columns plus rows of optional string cells.
/// `None` marks an empty cell.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Build an empty table from header names.
    pub fn with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names.into_iter().map(RawColumn::new).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating to the column count.
    pub fn push_row(&mut self, cells: Vec<Option<String>>) {
        let mut row = cells;
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Append a row of plain strings; blank strings become empty cells.
    pub fn push_str_row<S: AsRef<str>>(&mut self, cells: &[S]) {
        let row = cells
            .iter()
            .map(|cell| {
                let s = cell.as_ref();
                if s.trim().is_empty() { None } else { Some(s.to_string()) }
            })
            .collect();
        self.push_row(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads tabular files into untyped tables.
///
/// Implementations must be shareable across threads; the engine holds one
/// reader for the whole run.
pub trait TabularFileReader: Send + Sync + Debug {
    /// Read one source file into an untyped table.
    fn read(&self, path: &Path) -> Result<RawTable, ReadError>;

    /// Whether this reader handles files with the given extension
    /// (lowercase, without the dot). Catalog discovery uses this to pick
    /// candidates out of a directory listing.
    fn supports_extension(&self, extension: &str) -> bool;

    /// List candidate files in a source directory. The default walks the
    /// filesystem; virtual readers override this to enumerate their own
    /// entries.
    fn list_directory(&self, directory: &Path) -> Result<Vec<PathBuf>, ReadError> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                entries.push(entry.path());
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Delimited-text reader for `.csv` and `.tsv` files.
#[cfg(feature = "csv")]
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvTableReader;

#[cfg(feature = "csv")]
impl CsvTableReader {
    pub fn new() -> Self {
        Self
    }

    fn delimiter_for(path: &Path) -> u8 {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => b',',
        }
    }

    fn open_error(path: &Path, err: csv::Error) -> ReadError {
        match err.kind() {
            csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                ReadError::NotFound(path.display().to_string())
            }
            _ => ReadError::Malformed {
                path: path.display().to_string(),
                message: err.to_string(),
            },
        }
    }
}

#[cfg(feature = "csv")]
impl TabularFileReader for CsvTableReader {
    fn read(&self, path: &Path) -> Result<RawTable, ReadError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(Self::delimiter_for(path))
            .flexible(true)
            .from_path(path)
            .map_err(|e| Self::open_error(path, e))?;

        let headers = reader
            .headers()
            .map_err(|e| Self::open_error(path, e))?
            .clone();
        let mut table = RawTable {
            columns: headers.iter().map(RawColumn::new).collect(),
            rows: Vec::new(),
        };

        for record in reader.records() {
            let record = record.map_err(|e| ReadError::Malformed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let cells = (0..table.columns.len())
                .map(|i| {
                    record
                        .get(i)
                        .filter(|cell| !cell.trim().is_empty())
                        .map(str::to_string)
                })
                .collect();
            table.rows.push(cells);
        }
        Ok(table)
    }

    fn supports_extension(&self, extension: &str) -> bool {
        matches!(extension, "csv" | "tsv")
    }

    fn name(&self) -> &'static str {
        "CsvTableReader"
    }
}

/// In-memory reader: tables registered under a file name, matched by the
/// final path component. `list_directory` enumerates the registered names
/// so a catalog can be driven without touching the filesystem.
#[derive(Debug, Default)]
pub struct InMemoryTableReader {
    tables: RwLock<HashMap<String, RawTable>>,
}

impl InMemoryTableReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table under a file name such as `payments.csv`.
    pub fn insert(&self, file_name: impl Into<String>, table: RawTable) -> Result<(), ReadError> {
        let file_name = file_name.into();
        let mut tables = self.tables.write().map_err(|_| ReadError::Malformed {
            path: file_name.clone(),
            message: "table store lock poisoned".to_string(),
        })?;
        tables.insert(file_name, table);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TabularFileReader for InMemoryTableReader {
    fn read(&self, path: &Path) -> Result<RawTable, ReadError> {
        let key = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let tables = self.tables.read().map_err(|_| ReadError::Malformed {
            path: key.to_string(),
            message: "table store lock poisoned".to_string(),
        })?;
        tables
            .get(key)
            .cloned()
            .ok_or_else(|| ReadError::NotFound(key.to_string()))
    }

    fn supports_extension(&self, _extension: &str) -> bool {
        true
    }

    fn list_directory(&self, directory: &Path) -> Result<Vec<PathBuf>, ReadError> {
        let tables = self.tables.read().map_err(|_| ReadError::Malformed {
            path: directory.display().to_string(),
            message: "table store lock poisoned".to_string(),
        })?;
        let mut names: Vec<_> = tables.keys().cloned().collect();
        names.sort();
        Ok(names.into_iter().map(|name| directory.join(name)).collect())
    }

    fn name(&self) -> &'static str {
        "InMemoryTableReader"
    }
}
