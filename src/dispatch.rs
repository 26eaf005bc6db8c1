// src/dispatch.rs
//! Worker-pool dispatch.
//!
//! Fans render tasks out across isolated blocking workers, streams results
//! back in completion order, and enforces the per-task timeout and the
//! cooperative stop policy. Workers never share mutable state: each task
//! carries its own context and filter table, and the renderer is shared
//! immutably.

use crate::filters::FilterTable;
use crate::progress::ProgressReporter;
use crate::render::{RenderError, Renderer};
use crate::task::{RenderResult, RenderTask};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

/// Default per-task wait bound, measured from worker pickup.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Stop signals
// ============================================================================

/// Cooperative stop signal, polled between task submissions and result
/// completions. Dispatch never interrupts a worker mid-render.
pub trait StopSignal: Send + Sync {
    fn should_stop(&self) -> bool;
}

impl<F> StopSignal for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn should_stop(&self) -> bool {
        self()
    }
}

/// Never stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

/// A triggerable stop handle; clones observe the same flag, so a front
/// end keeps one and hands the other to the pipeline.
#[derive(Debug, Default, Clone)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl StopSignal for StopToken {
    fn should_stop(&self) -> bool {
        self.is_triggered()
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// What a dispatch run produced. Results arrive in completion order;
/// abandoned tasks contribute nothing.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub results: Vec<RenderResult>,
    pub stopped: bool,
}

impl DispatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Fixed-capacity pool running one blocking worker per in-flight task.
///
/// All tasks are submitted up front; a semaphore with one permit per
/// worker bounds how many render at once. The timeout clock for a task
/// starts when it acquires a permit, not when it is submitted, so a long
/// queue cannot time tasks out before they ever run.
pub struct Dispatcher {
    worker_count: usize,
    task_timeout: Duration,
    filters: FilterTable,
}

impl Dispatcher {
    pub fn new(worker_count: usize, task_timeout: Duration) -> Self {
        Self {
            worker_count: worker_count.max(1),
            task_timeout,
            filters: FilterTable::standard(),
        }
    }

    /// Replace the standard filter table handed to every render call.
    pub fn with_filter_table(mut self, filters: FilterTable) -> Self {
        self.filters = filters;
        self
    }

    /// Half the available cores, clamped to `2..=8`. Renderers tend to be
    /// memory-bound, so saturating every core buys little.
    pub fn default_worker_count() -> usize {
        (num_cpus::get() / 2).clamp(2, 8)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    /// Run every task to a result, streaming each to the reporter as it
    /// lands.
    ///
    /// A stop signal observed during submission stops further submissions;
    /// observed during collection it abandons everything still in flight.
    /// Either way the results already streamed stay valid.
    pub async fn run(
        &self,
        tasks: Vec<RenderTask>,
        renderer: Arc<dyn Renderer>,
        reporter: &ProgressReporter,
        stop: &dyn StopSignal,
    ) -> DispatchOutcome {
        let planned = tasks.len();
        reporter.begin_dispatch(planned);
        info!(
            "[DISPATCH] {} task(s) across {} worker(s), timeout {:?}.",
            planned, self.worker_count, self.task_timeout
        );

        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut in_flight: JoinSet<RenderResult> = JoinSet::new();
        let mut stopped = false;

        for task in tasks {
            if stop.should_stop() {
                warn!(
                    "[DISPATCH] Stop signal observed during submission; {} task(s) not submitted.",
                    planned - in_flight.len()
                );
                stopped = true;
                break;
            }
            let semaphore = Arc::clone(&semaphore);
            let renderer = Arc::clone(&renderer);
            let filters = self.filters.clone();
            let timeout = self.task_timeout;
            in_flight.spawn(async move {
                let record_index = task.record_index;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return RenderResult::failure(
                        record_index,
                        RenderError::Renderer("worker pool closed".to_string()),
                    );
                };
                let work =
                    task::spawn_blocking(move || render_one(renderer.as_ref(), &filters, task));
                match tokio::time::timeout(timeout, work).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_error)) => RenderResult::failure(
                        record_index,
                        RenderError::Panicked(join_error.to_string()),
                    ),
                    Err(_) => RenderResult::failure(record_index, RenderError::Timeout(timeout)),
                }
            });
        }

        if stopped {
            // Nothing already submitted gets collected either; the run is
            // over and in-flight renders finish detached.
            in_flight.abort_all();
            return DispatchOutcome { results: Vec::new(), stopped };
        }

        let mut results = Vec::with_capacity(planned);
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(result) => {
                    reporter.record(&result);
                    results.push(result);
                }
                Err(join_error) if join_error.is_cancelled() => {
                    debug!("[DISPATCH] Task aborted before completion.");
                }
                Err(join_error) => {
                    warn!("[DISPATCH] Worker join failed: {}", join_error);
                }
            }
            if stop.should_stop() {
                warn!(
                    "[DISPATCH] Stop signal observed; abandoning {} in-flight task(s).",
                    in_flight.len()
                );
                stopped = true;
                in_flight.abort_all();
                break;
            }
        }

        info!(
            "[DISPATCH] Collected {} result(s){}.",
            results.len(),
            if stopped { " before stop" } else { "" }
        );
        DispatchOutcome { results, stopped }
    }
}

/// Runs on a blocking worker: render the document and write it out.
fn render_one(renderer: &dyn Renderer, filters: &FilterTable, task: RenderTask) -> RenderResult {
    let record_index = task.record_index;
    debug!("[RENDER-{}] Starting render.", record_index);

    let bytes = match renderer.render(&task.template, &task.context, filters) {
        Ok(bytes) => bytes,
        Err(error) => {
            debug!("[RENDER-{}] Failed: {}", record_index, error);
            return RenderResult::failure(record_index, error);
        }
    };

    let output = task.output_path(renderer.file_extension());
    if let Err(error) = std::fs::write(&output, &bytes) {
        return RenderResult::failure(
            record_index,
            RenderError::OutputWrite {
                path: output.display().to_string(),
                message: error.to_string(),
            },
        );
    }

    debug!(
        "[RENDER-{}] Wrote {} byte(s) to {}.",
        record_index,
        bytes.len(),
        output.display()
    );
    RenderResult::success(record_index, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_count_is_clamped() {
        let count = Dispatcher::default_worker_count();
        assert!((2..=8).contains(&count));
    }

    #[test]
    fn test_worker_count_floor_is_one() {
        let dispatcher = Dispatcher::new(0, DEFAULT_TASK_TIMEOUT);
        assert_eq!(dispatcher.worker_count(), 1);
    }

    #[test]
    fn test_stop_token_is_shared_across_clones() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!clone.should_stop());
        token.trigger();
        assert!(clone.should_stop());
        assert!(clone.is_triggered());
    }

    #[test]
    fn test_closure_stop_signal() {
        let stop = || true;
        assert!(StopSignal::should_stop(&stop));
    }

    #[test]
    fn test_outcome_counts() {
        let outcome = DispatchOutcome {
            results: vec![
                RenderResult::success(0, "/out/a"),
                RenderResult::failure(1, RenderError::Renderer("x".into())),
                RenderResult::success(2, "/out/b"),
            ],
            stopped: false,
        };
        assert_eq!(outcome.succeeded(), 2);
        assert_eq!(outcome.failed(), 1);
    }
}
