//! # ream
//!
//! Parallel mail-merge engine: joins spreadsheet-like tables on a key
//! column and renders one document per primary-table record through a
//! pluggable [`Renderer`], fanning the work out across isolated workers.
//!
//! The crate is organized as a pipeline:
//!
//! - [`reader`]: raw tabular access (CSV/TSV and in-memory readers)
//! - [`source`]: typed ingestion with sample-based column inference
//! - [`catalog`]: primary plus auxiliary table discovery for one run
//! - [`context`]: per-record contexts, joined on the key column
//! - [`filters`]: value-formatting filters handed to each render call
//! - [`task`]: the dispatched unit of work and its outcome
//! - [`dispatch`]: the worker pool with timeout and cooperative stop
//! - [`progress`]: streaming narration and the run summary
//! - [`pipeline`]: the builder and the generate entry points
//!
//! ## Example
//!
//! ```ignore
//! use ream::{GenerateJob, PipelineBuilder};
//! use std::sync::Arc;
//!
//! let pipeline = PipelineBuilder::new()
//!     .with_key_column("id")
//!     .with_file_name_column("name")
//!     .build()?;
//!
//! let job = GenerateJob::new("./tables", "borrowers.csv", "./letter.docx", "./out");
//! let summary = pipeline.generate(&job, Arc::new(my_renderer))?;
//! println!("{} rendered, {} failed", summary.succeeded, summary.failed);
//! ```

pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod filters;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod render;
pub mod source;
pub mod task;
pub mod value;

pub use catalog::TableCatalog;
pub use context::{ContextAssembler, ContextValue, PRIMARY_FIELD_SUFFIX, RecordContext};
pub use dispatch::{
    DEFAULT_TASK_TIMEOUT, DispatchOutcome, Dispatcher, NeverStop, StopSignal, StopToken,
};
pub use error::GenerateError;
pub use filters::{FilterFn, FilterTable};
pub use pipeline::{GenerateJob, GenerationPipeline, PipelineBuilder};
pub use progress::{
    FailureNote, MemorySink, NullSink, ProgressReporter, ProgressSink, RunSummary,
};
#[cfg(feature = "csv")]
pub use reader::CsvTableReader;
pub use reader::{InMemoryTableReader, RawColumn, RawTable, ReadError, TabularFileReader};
pub use render::{RenderError, Renderer};
pub use source::{Column, ColumnKind, Relation, TableSource, normalize_column_name};
pub use task::{RenderOutcome, RenderResult, RenderTask, sanitize_file_name};
pub use value::{CellValue, NULL_SENTINEL};
