// src/render.rs
//! The rendering boundary.
//!
//! The engine knows nothing about document formats. It hands a template
//! path, an assembled context, and a filter table to a [`Renderer`] and
//! receives finished document bytes; writing and naming the output file
//! stays on the engine side.

use crate::context::RecordContext;
use crate::filters::FilterTable;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Per-record rendering failures. These never abort a batch; each one
/// becomes a failure result for its record.
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Failed to write output '{path}': {message}")]
    OutputWrite { path: String, message: String },

    #[error("Render timed out after {0:?}")]
    Timeout(Duration),

    #[error("Renderer panicked: {0}")]
    Panicked(String),
}

/// An opaque document renderer.
///
/// Implementations load the template, resolve placeholders from the
/// context (applying filters where the template asks for them), and
/// return the document bytes. One renderer instance is shared immutably
/// across all workers, so implementations must be `Send + Sync`; any
/// internal caching needs its own synchronization.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        template: &Path,
        context: &RecordContext,
        filters: &FilterTable,
    ) -> Result<Vec<u8>, RenderError>;

    /// Extension (without the dot) for output files.
    fn file_extension(&self) -> &str {
        "docx"
    }
}
