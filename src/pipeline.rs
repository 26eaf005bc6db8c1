// src/pipeline.rs
//! The top-level engine: job description, pipeline, and builder.
//!
//! A [`GenerationPipeline`] is configured once and can run any number of
//! jobs. Each run loads the catalog, assembles one context per primary
//! record, and dispatches the render tasks across the worker pool; the
//! caller gets a [`RunSummary`] back and per-record failures never abort
//! the batch.

use crate::catalog::TableCatalog;
use crate::context::ContextAssembler;
use crate::dispatch::{DEFAULT_TASK_TIMEOUT, Dispatcher, NeverStop, StopSignal};
use crate::error::GenerateError;
use crate::filters::FilterTable;
use crate::progress::{NullSink, ProgressReporter, ProgressSink, RunSummary};
use crate::reader::TabularFileReader;
use crate::render::Renderer;
use crate::source::normalize_column_name;
use crate::task::RenderTask;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Builder;

/// Resolved run parameters, as supplied by a front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateJob {
    /// Directory holding the primary table and any auxiliary tables.
    pub source_dir: PathBuf,
    /// File name of the primary table within `source_dir`.
    pub primary_file: String,
    /// Template handed to the renderer for every record.
    pub template: PathBuf,
    /// Where rendered documents land; created if missing.
    pub output_dir: PathBuf,
}

impl GenerateJob {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        primary_file: impl Into<String>,
        template: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            primary_file: primary_file.into(),
            template: template.into(),
            output_dir: output_dir.into(),
        }
    }
}

pub struct GenerationPipeline {
    key_column: String,
    file_name_column: String,
    dispatcher: Dispatcher,
    reader: Box<dyn TabularFileReader>,
    sink: Arc<dyn ProgressSink>,
    stop: Arc<dyn StopSignal>,
}

impl fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("key_column", &self.key_column)
            .field("file_name_column", &self.file_name_column)
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

impl GenerationPipeline {
    /// Render one document per primary record.
    ///
    /// Fatal configuration problems return `Err`; per-record failures are
    /// folded into the summary.
    pub async fn generate_async(
        &self,
        job: &GenerateJob,
        renderer: Arc<dyn Renderer>,
    ) -> Result<RunSummary, GenerateError> {
        let reporter = ProgressReporter::new(Arc::clone(&self.sink));

        if !job.template.is_file() {
            return Err(GenerateError::Config(format!(
                "Template not found: {}",
                job.template.display()
            )));
        }
        std::fs::create_dir_all(&job.output_dir)?;

        reporter.info(format!("Loading tables from {}.", job.source_dir.display()));
        let catalog = TableCatalog::load_all(
            &job.source_dir,
            &job.primary_file,
            self.reader.as_ref(),
            &reporter,
        )?;
        if catalog.primary().is_empty() {
            return Err(GenerateError::Config(format!(
                "Primary table '{}' has no records",
                catalog.primary().name()
            )));
        }
        let assembler = ContextAssembler::new(&catalog, &self.key_column)?;

        let total = catalog.primary().row_count();
        let mut tasks = Vec::with_capacity(total);
        for record_index in 0..total {
            if self.stop.should_stop() {
                reporter.warn(format!(
                    "Stop requested while preparing tasks; {} of {} prepared.",
                    tasks.len(),
                    total
                ));
                return Ok(reporter.finish(tasks.len(), &[], true));
            }
            tasks.push(RenderTask::new(
                record_index,
                assembler.assemble(record_index)?,
                &job.template,
                &job.output_dir,
                &self.file_name_column,
                &self.key_column,
            ));
        }
        info!("Prepared {} render task(s).", tasks.len());

        let planned = tasks.len();
        let outcome = self
            .dispatcher
            .run(tasks, renderer, &reporter, self.stop.as_ref())
            .await;
        Ok(reporter.finish(planned, &outcome.results, outcome.stopped))
    }

    /// Synchronous entry point; owns its own runtime.
    pub fn generate(
        &self,
        job: &GenerateJob,
        renderer: Arc<dyn Renderer>,
    ) -> Result<RunSummary, GenerateError> {
        let rt = Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| GenerateError::Other(format!("Failed to create Tokio runtime: {}", e)))?;
        rt.block_on(self.generate_async(job, renderer))
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn file_name_column(&self) -> &str {
        &self.file_name_column
    }

    pub fn worker_count(&self) -> usize {
        self.dispatcher.worker_count()
    }

    pub fn task_timeout(&self) -> Duration {
        self.dispatcher.task_timeout()
    }
}

pub struct PipelineBuilder {
    key_column: String,
    file_name_column: Option<String>,
    worker_count: Option<usize>,
    task_timeout: Duration,
    filters: FilterTable,
    reader: Option<Box<dyn TabularFileReader>>,
    sink: Arc<dyn ProgressSink>,
    stop: Arc<dyn StopSignal>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            key_column: "id".to_string(),
            file_name_column: None,
            worker_count: None,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            filters: FilterTable::standard(),
            reader: None,
            sink: Arc::new(NullSink),
            stop: Arc::new(NeverStop),
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Join key shared by the primary and auxiliary tables. Defaults to
    /// `id`.
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    /// Primary column whose value names each output file. Defaults to the
    /// key column.
    pub fn with_file_name_column(mut self, column: impl Into<String>) -> Self {
        self.file_name_column = Some(column.into());
        self
    }

    /// Concurrent render workers. Defaults to half the cores, clamped to
    /// `2..=8`.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    /// Per-task wait bound, measured from worker pickup.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Replace the standard filter table handed to every render call.
    pub fn with_filter_table(mut self, filters: FilterTable) -> Self {
        self.filters = filters;
        self
    }

    /// Table reader for the source directory. Defaults to the CSV/TSV
    /// reader when the `csv` feature is on.
    pub fn with_reader(mut self, reader: Box<dyn TabularFileReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Where run narration goes. Defaults to the log only.
    pub fn with_progress_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Cooperative stop signal polled during runs.
    pub fn with_stop_signal(mut self, stop: impl StopSignal + 'static) -> Self {
        self.stop = Arc::new(stop);
        self
    }

    pub fn build(self) -> Result<GenerationPipeline, GenerateError> {
        let key_column = normalize_column_name(&self.key_column);
        if key_column.is_empty() {
            return Err(GenerateError::Config(
                "Key column name must not be empty".to_string(),
            ));
        }
        let file_name_column = self
            .file_name_column
            .map(|column| normalize_column_name(&column))
            .filter(|column| !column.is_empty())
            .unwrap_or_else(|| key_column.clone());

        let reader = match self.reader {
            Some(reader) => reader,
            None => default_reader()?,
        };
        let worker_count = self.worker_count.unwrap_or_else(Dispatcher::default_worker_count);
        let dispatcher =
            Dispatcher::new(worker_count, self.task_timeout).with_filter_table(self.filters);

        Ok(GenerationPipeline {
            key_column,
            file_name_column,
            dispatcher,
            reader,
            sink: self.sink,
            stop: self.stop,
        })
    }
}

#[cfg(feature = "csv")]
fn default_reader() -> Result<Box<dyn TabularFileReader>, GenerateError> {
    Ok(Box::new(crate::reader::CsvTableReader::new()))
}

#[cfg(not(feature = "csv"))]
fn default_reader() -> Result<Box<dyn TabularFileReader>, GenerateError> {
    Err(GenerateError::Config(
        "No table reader configured; enable the `csv` feature or supply one with `with_reader`"
            .to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::InMemoryTableReader;

    #[test]
    fn test_builder_defaults() {
        let pipeline = PipelineBuilder::new()
            .with_reader(Box::new(InMemoryTableReader::new()))
            .build()
            .unwrap();
        assert_eq!(pipeline.key_column(), "id");
        assert_eq!(pipeline.file_name_column(), "id");
        assert!((2..=8).contains(&pipeline.worker_count()));
        assert_eq!(pipeline.task_timeout(), DEFAULT_TASK_TIMEOUT);
    }

    #[test]
    fn test_builder_normalizes_columns() {
        let pipeline = PipelineBuilder::new()
            .with_key_column(" Contract ")
            .with_file_name_column("NAME")
            .with_reader(Box::new(InMemoryTableReader::new()))
            .build()
            .unwrap();
        assert_eq!(pipeline.key_column(), "contract");
        assert_eq!(pipeline.file_name_column(), "name");
    }

    #[test]
    fn test_empty_key_column_is_rejected() {
        let err = PipelineBuilder::new()
            .with_key_column("   ")
            .build()
            .unwrap_err();
        assert!(matches!(err, GenerateError::Config(_)));
    }

    #[test]
    fn test_job_serde_round_trip() {
        let job = GenerateJob::new("/data", "borrowers.csv", "/tpl/letter.docx", "/out");
        let json = serde_json::to_string(&job).unwrap();
        let back: GenerateJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.primary_file, "borrowers.csv");
        assert_eq!(back.output_dir, PathBuf::from("/out"));
    }
}
