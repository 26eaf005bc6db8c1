// tests/common/mod.rs
//! Shared helpers for integration tests: scripted renderers and table
//! fixtures.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

pub mod fixtures;

use ream::{FilterTable, RecordContext, RenderError, Renderer, StopToken};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Whether the context's cell renders to the given display value.
fn cell_matches(context: &RecordContext, field: &str, value: &str) -> bool {
    context
        .cell(field)
        .map(|cell| cell.to_display_string() == value)
        .unwrap_or(false)
}

/// Renders a plain-text stand-in document: one line per context field.
/// Related-rows entries render as `name[count]`.
#[derive(Debug, Default)]
pub struct TextRenderer {
    calls: AtomicUsize,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn render_text(&self, context: &RecordContext) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut lines = Vec::new();
        for name in context.field_names() {
            if let Some(cell) = context.cell(name) {
                lines.push(format!("{}={}", name, cell.to_display_string()));
            } else if let Some(rows) = context.rows(name) {
                lines.push(format!("{}[{}]", name, rows.len()));
            }
        }
        lines.join("\n")
    }
}

impl Renderer for TextRenderer {
    fn render(
        &self,
        _template: &Path,
        context: &RecordContext,
        _filters: &FilterTable,
    ) -> Result<Vec<u8>, RenderError> {
        Ok(self.render_text(context).into_bytes())
    }

    fn file_extension(&self) -> &str {
        "txt"
    }
}

/// Fails records whose `field` cell displays as `value`; renders text for
/// everything else.
#[derive(Debug)]
pub struct ErringRenderer {
    inner: TextRenderer,
    field: String,
    value: String,
}

impl ErringRenderer {
    pub fn new(field: &str, value: &str) -> Self {
        Self {
            inner: TextRenderer::new(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

impl Renderer for ErringRenderer {
    fn render(
        &self,
        template: &Path,
        context: &RecordContext,
        filters: &FilterTable,
    ) -> Result<Vec<u8>, RenderError> {
        if cell_matches(context, &self.field, &self.value) {
            return Err(RenderError::Renderer("simulated render failure".to_string()));
        }
        self.inner.render(template, context, filters)
    }

    fn file_extension(&self) -> &str {
        "txt"
    }
}

/// Sleeps before rendering records whose `field` cell displays as
/// `value`; other records render immediately.
#[derive(Debug)]
pub struct StallingRenderer {
    inner: TextRenderer,
    field: String,
    value: String,
    delay: Duration,
}

impl StallingRenderer {
    pub fn new(field: &str, value: &str, delay: Duration) -> Self {
        Self {
            inner: TextRenderer::new(),
            field: field.to_string(),
            value: value.to_string(),
            delay,
        }
    }
}

impl Renderer for StallingRenderer {
    fn render(
        &self,
        template: &Path,
        context: &RecordContext,
        filters: &FilterTable,
    ) -> Result<Vec<u8>, RenderError> {
        if cell_matches(context, &self.field, &self.value) {
            std::thread::sleep(self.delay);
        }
        self.inner.render(template, context, filters)
    }

    fn file_extension(&self) -> &str {
        "txt"
    }
}

/// Panics on records whose `field` cell displays as `value`.
#[derive(Debug)]
pub struct PanickingRenderer {
    inner: TextRenderer,
    field: String,
    value: String,
}

impl PanickingRenderer {
    pub fn new(field: &str, value: &str) -> Self {
        Self {
            inner: TextRenderer::new(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

impl Renderer for PanickingRenderer {
    fn render(
        &self,
        template: &Path,
        context: &RecordContext,
        filters: &FilterTable,
    ) -> Result<Vec<u8>, RenderError> {
        if cell_matches(context, &self.field, &self.value) {
            panic!("simulated renderer panic");
        }
        self.inner.render(template, context, filters)
    }

    fn file_extension(&self) -> &str {
        "txt"
    }
}

/// Triggers a stop token once it has rendered `after` documents, then
/// keeps rendering normally.
#[derive(Debug)]
pub struct StopTriggerRenderer {
    inner: TextRenderer,
    token: StopToken,
    after: usize,
}

impl StopTriggerRenderer {
    pub fn new(token: StopToken, after: usize) -> Self {
        Self { inner: TextRenderer::new(), token, after }
    }

    pub fn call_count(&self) -> usize {
        self.inner.call_count()
    }
}

impl Renderer for StopTriggerRenderer {
    fn render(
        &self,
        template: &Path,
        context: &RecordContext,
        filters: &FilterTable,
    ) -> Result<Vec<u8>, RenderError> {
        let rendered = self.inner.render(template, context, filters);
        if self.inner.call_count() >= self.after {
            self.token.trigger();
        }
        rendered
    }

    fn file_extension(&self) -> &str {
        "txt"
    }
}
