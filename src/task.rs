// src/task.rs
//! Units of dispatched work and their outcomes.

use crate::context::{PRIMARY_FIELD_SUFFIX, RecordContext};
use crate::render::RenderError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix applied to every generated file name.
const OUTPUT_PREFIX: &str = "doc_";

/// Everything a worker needs to render and place one document.
///
/// A task is a plain, fully-owned value: no handles, no borrowed state.
/// It crosses the worker boundary by move and serializes on its own,
/// which also keeps failed tasks easy to log or replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderTask {
    pub record_index: usize,
    pub context: RecordContext,
    pub template: PathBuf,
    pub output_dir: PathBuf,
    /// Normalized column whose value names the output file.
    pub file_name_column: String,
    /// Normalized key column, the first fallback for naming.
    pub key_column: String,
}

impl RenderTask {
    pub fn new(
        record_index: usize,
        context: RecordContext,
        template: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        file_name_column: impl Into<String>,
        key_column: impl Into<String>,
    ) -> Self {
        Self {
            record_index,
            context,
            template: template.into(),
            output_dir: output_dir.into(),
            file_name_column: file_name_column.into(),
            key_column: key_column.into(),
        }
    }

    /// Output file name: the filename-source value, falling back to the
    /// key value and then the record index; sanitized and prefixed.
    pub fn output_file_name(&self, extension: &str) -> String {
        format!("{}{}.{}", OUTPUT_PREFIX, self.file_name_stem(), extension)
    }

    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.output_dir.join(self.output_file_name(extension))
    }

    fn file_name_stem(&self) -> String {
        for column in [&self.file_name_column, &self.key_column] {
            let field = format!("{}{}", column, PRIMARY_FIELD_SUFFIX);
            if let Some(cell) = self.context.cell(&field) {
                let candidate = sanitize_file_name(&cell.to_display_string());
                if !candidate.is_empty() {
                    return candidate;
                }
            }
        }
        self.record_index.to_string()
    }
}

/// Keep Unicode alphanumerics plus `-`, `_` and `.`; spaces become
/// underscores and everything else is dropped. Cyrillic and other
/// non-Latin names survive as-is.
pub fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

/// Terminal outcome of one task.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    Success { output: PathBuf },
    Failure { error: RenderError },
}

/// One task's outcome tagged with its record index, so completion order
/// never obscures which record produced what.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub record_index: usize,
    pub outcome: RenderOutcome,
}

impl RenderResult {
    pub fn success(record_index: usize, output: impl Into<PathBuf>) -> Self {
        Self { record_index, outcome: RenderOutcome::Success { output: output.into() } }
    }

    pub fn failure(record_index: usize, error: RenderError) -> Self {
        Self { record_index, outcome: RenderOutcome::Failure { error } }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RenderOutcome::Success { .. })
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.outcome {
            RenderOutcome::Success { output } => Some(output),
            RenderOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&RenderError> {
        match &self.outcome {
            RenderOutcome::Failure { error } => Some(error),
            RenderOutcome::Success { .. } => None,
        }
    }
}
