// src/progress.rs
//! Streaming run narration and the end-of-run summary.
//!
//! A [`ProgressReporter`] receives every result as it lands and forwards
//! one human-readable line per event to a [`ProgressSink`], so a front
//! end can show live progress without polling. `finish` folds the
//! results into a [`RunSummary`].

use crate::task::{RenderOutcome, RenderResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How many failures the summary narration spells out.
const FAILURE_PREVIEW: usize = 3;

/// Receives the human-readable narration of a run.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, line: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn emit(&self, line: &str) {
        self(line)
    }
}

/// Discards all narration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _line: &str) {}
}

/// Collects narration lines behind a shared handle; clones observe the
/// same buffer. Meant for tests and buffered front ends.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Everything a front end needs to show after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Tasks prepared for dispatch.
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Whether a stop signal cut the run short.
    pub stopped: bool,
    pub elapsed: Duration,
    /// Completed results per second over the whole run.
    pub throughput: f64,
    pub failures: Vec<FailureNote>,
}

impl RunSummary {
    /// Results actually produced; abandoned tasks are not counted.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// One failed record, as shown in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNote {
    pub record_index: usize,
    pub message: String,
}

/// Streams narration for one run and accumulates the counters behind the
/// throughput figure. Construct one per run; the clock starts here.
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    started: Instant,
    done: AtomicUsize,
    planned: AtomicUsize,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            started: Instant::now(),
            done: AtomicUsize::new(0),
            planned: AtomicUsize::new(0),
        }
    }

    /// A reporter that narrates only to the log.
    pub fn silent() -> Self {
        Self::new(Arc::new(NullSink))
    }

    pub fn info(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        info!("{}", line);
        self.sink.emit(line);
    }

    pub fn warn(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        warn!("{}", line);
        self.sink.emit(&format!("WARNING: {}", line));
    }

    /// Announce the batch size before dispatch begins.
    pub fn begin_dispatch(&self, planned: usize) {
        self.planned.store(planned, Ordering::Relaxed);
        self.info(format!("Dispatching {} render task(s).", planned));
    }

    /// Narrate one landed result.
    pub fn record(&self, result: &RenderResult) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let planned = self.planned.load(Ordering::Relaxed);
        match &result.outcome {
            RenderOutcome::Success { output } => {
                let name = output
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("<output>");
                self.info(format!(
                    "[{}/{}] {} ({:.1} docs/sec)",
                    done,
                    planned,
                    name,
                    self.throughput(done)
                ));
            }
            RenderOutcome::Failure { error } => {
                self.warn(format!(
                    "[{}/{}] record {} failed: {}",
                    done, planned, result.record_index, error
                ));
            }
        }
    }

    /// Fold the collected results into a summary and narrate it.
    pub fn finish(&self, planned: usize, results: &[RenderResult], stopped: bool) -> RunSummary {
        let elapsed = self.started.elapsed();
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let failures: Vec<FailureNote> = results
            .iter()
            .filter_map(|result| match &result.outcome {
                RenderOutcome::Failure { error } => Some(FailureNote {
                    record_index: result.record_index,
                    message: error.to_string(),
                }),
                RenderOutcome::Success { .. } => None,
            })
            .collect();
        let failed = failures.len();

        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 { (succeeded + failed) as f64 / secs } else { 0.0 };

        if stopped {
            self.warn(format!(
                "Generation stopped: {} of {} task(s) completed.",
                succeeded + failed,
                planned
            ));
        }
        self.info(format!(
            "Done in {:.1}s: {} succeeded, {} failed ({:.1} docs/sec).",
            secs, succeeded, failed, throughput
        ));
        for note in failures.iter().take(FAILURE_PREVIEW) {
            self.info(format!("  record {}: {}", note.record_index, note.message));
        }
        if failures.len() > FAILURE_PREVIEW {
            self.info(format!(
                "  ... and {} more failure(s)",
                failures.len() - FAILURE_PREVIEW
            ));
        }

        RunSummary { planned, succeeded, failed, stopped, elapsed, throughput, failures }
    }

    fn throughput(&self, done: usize) -> f64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs > 0.0 { done as f64 / secs } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderError;

    fn results(succeed: usize, fail: usize) -> Vec<RenderResult> {
        let mut all = Vec::new();
        for i in 0..succeed {
            all.push(RenderResult::success(i, format!("/out/doc_{}.docx", i)));
        }
        for i in 0..fail {
            all.push(RenderResult::failure(
                succeed + i,
                RenderError::Renderer(format!("boom {}", i)),
            ));
        }
        all
    }

    #[test]
    fn test_memory_sink_collects_lines() {
        let sink = MemorySink::new();
        let reporter = ProgressReporter::new(Arc::new(sink.clone()));
        reporter.info("hello");
        reporter.warn("trouble");

        assert_eq!(sink.lines().len(), 2);
        assert!(sink.contains("hello"));
        assert!(sink.contains("WARNING: trouble"));
    }

    #[test]
    fn test_record_narrates_both_outcomes() {
        let sink = MemorySink::new();
        let reporter = ProgressReporter::new(Arc::new(sink.clone()));
        reporter.begin_dispatch(2);
        reporter.record(&RenderResult::success(0, "/out/doc_a.docx"));
        reporter.record(&RenderResult::failure(1, RenderError::Renderer("boom".into())));

        assert!(sink.contains("[1/2] doc_a.docx"));
        assert!(sink.contains("[2/2] record 1 failed: Renderer error: boom"));
    }

    #[test]
    fn test_finish_counts_and_flags() {
        let reporter = ProgressReporter::silent();
        let summary = reporter.finish(5, &results(3, 2), false);

        assert_eq!(summary.planned, 5);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.attempted(), 5);
        assert!(!summary.stopped);
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures[0].record_index, 3);
        assert!(summary.failures[0].message.contains("boom 0"));
    }

    #[test]
    fn test_finish_previews_first_three_failures() {
        let sink = MemorySink::new();
        let reporter = ProgressReporter::new(Arc::new(sink.clone()));
        let summary = reporter.finish(5, &results(0, 5), false);

        assert_eq!(summary.failures.len(), 5);
        let lines = sink.lines();
        let previews = lines.iter().filter(|l| l.contains("  record ")).count();
        assert_eq!(previews, 3);
        assert!(sink.contains("... and 2 more failure(s)"));
    }

    #[test]
    fn test_finish_narrates_stop() {
        let sink = MemorySink::new();
        let reporter = ProgressReporter::new(Arc::new(sink.clone()));
        let summary = reporter.finish(10, &results(4, 0), true);

        assert!(summary.stopped);
        assert!(sink.contains("Generation stopped: 4 of 10"));
    }

    #[test]
    fn test_summary_serializes() {
        let reporter = ProgressReporter::silent();
        let summary = reporter.finish(2, &results(1, 1), false);
        let json = serde_json::to_string(&summary).unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.succeeded, 1);
        assert_eq!(back.failed, 1);
        assert_eq!(back.failures, summary.failures);
    }
}
