//! Bounded worker pool that turns tasks into results.
//!
//! Tasks run on a dedicated rayon pool of `concurrency` threads.
//! Every task a worker takes produces exactly one [`ConversionResult`], on
//! every path: unsupported extension, extractor error, write error, or a
//! panic inside the extractor. Results reach the caller in completion order.

use crate::config::{DegradedPolicy, Postprocess, clamp_concurrency};
use crate::discovery::Task;
use crate::engine::Extractor;
use crate::error::{ErrorKind, ExtractionError, TaskError};
use crate::monitor::ResourceMonitor;
use crate::postprocess::normalize_text;
use crate::registry::{Registry, extension_of};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};
use tracing::{Span, debug, info, warn};

/// Interval between memory checks while admission is held back.
pub const ADMISSION_POLL: Duration = Duration::from_millis(100);
const ADMISSION_MAX_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Text came from a fallback extraction path and was accepted by policy.
    #[serde(default)]
    pub degraded: bool,
}

impl ConversionResult {
    pub fn succeeded(task: &Task, degraded: bool) -> Self {
        Self {
            input_path: task.input_path.clone(),
            output_path: task.output_path.clone(),
            success: true,
            error: None,
            error_kind: None,
            degraded,
        }
    }

    pub fn failed(task: &Task, err: &TaskError) -> Self {
        Self {
            input_path: task.input_path.clone(),
            output_path: task.output_path.clone(),
            success: false,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            degraded: false,
        }
    }
}

/// Side observer of the result stream, called on the collecting thread.
pub trait ProgressObserver: Sync {
    fn on_result(&self, result: &ConversionResult, completed: usize, total: usize);
}

/// Shared flag that stops workers from taking new tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// In completion order.
    pub results: Vec<ConversionResult>,
    /// Tasks never started because the run was cancelled.
    pub abandoned: usize,
}

pub struct Scheduler<'a> {
    registry: &'a Registry,
    concurrency: usize,
    degraded_policy: DegradedPolicy,
    postprocess: Postprocess,
    admission: Option<&'a ResourceMonitor>,
    admission_max_wait: Duration,
    cancel: Option<CancelFlag>,
    observer: Option<&'a dyn ProgressObserver>,
    span: Span,
}

impl<'a> Scheduler<'a> {
    /// `concurrency` is clamped to `1..=MAX_CONCURRENCY`.
    pub fn new(registry: &'a Registry, concurrency: usize, span: Span) -> Self {
        Self {
            registry,
            concurrency: clamp_concurrency(concurrency),
            degraded_policy: DegradedPolicy::default(),
            postprocess: Postprocess::default(),
            admission: None,
            admission_max_wait: ADMISSION_MAX_WAIT,
            cancel: None,
            observer: None,
            span,
        }
    }

    pub fn with_degraded_policy(mut self, policy: DegradedPolicy) -> Self {
        self.degraded_policy = policy;
        self
    }

    pub fn with_postprocess(mut self, postprocess: Postprocess) -> Self {
        self.postprocess = postprocess;
        self
    }

    /// Delay each new task while the monitor reports the ceiling is reached.
    pub fn with_admission_control(mut self, monitor: &'a ResourceMonitor) -> Self {
        self.admission = Some(monitor);
        self
    }

    /// Longest a task is held back by admission control before it runs
    /// anyway. Defaults to five seconds.
    pub fn with_admission_timeout(mut self, max_wait: Duration) -> Self {
        self.admission_max_wait = max_wait;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn run(&self, tasks: Vec<Task>) -> BatchOutcome {
        let total = tasks.len();
        if total == 0 {
            return BatchOutcome::default();
        }

        let workers = self.concurrency.min(total);
        let (tx, rx) = mpsc::channel::<ConversionResult>();
        let mut results = Vec::with_capacity(total);

        info!(parent: &self.span, tasks = total, workers, "starting batch");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("doc2txt-worker-{i}"))
            .build();
        let tasks = &tasks;

        std::thread::scope(|scope| {
            // `install` blocks its caller, so the pool is driven off this
            // thread and results are drained here as they complete.
            scope.spawn(move || match pool {
                Ok(pool) => pool.install(|| {
                    tasks
                        .par_iter()
                        .for_each_with(tx, |tx, task| self.process(task, tx));
                }),
                Err(e) => {
                    warn!(parent: &self.span, "cannot build worker pool, running sequentially: {e}");
                    for task in tasks {
                        self.process(task, &tx);
                    }
                }
            });

            for result in rx {
                if let Some(observer) = self.observer {
                    observer.on_result(&result, results.len() + 1, total);
                }
                results.push(result);
            }
        });

        let abandoned = total - results.len();
        if abandoned > 0 {
            warn!(parent: &self.span, abandoned, "run cancelled; unscheduled tasks abandoned");
        }
        BatchOutcome { results, abandoned }
    }

    /// Sends exactly one result for `task`, or none when the run is cancelled
    /// before it starts.
    fn process(&self, task: &Task, tx: &mpsc::Sender<ConversionResult>) {
        if self.is_cancelled() {
            return;
        }
        let _enter = self.span.enter();
        self.wait_for_admission();
        if self.is_cancelled() {
            return;
        }

        let result = self.execute(task);
        if tx.send(result).is_err() {
            debug!("collector gone; dropping result for {}", task.input_path.display());
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    fn wait_for_admission(&self) {
        let Some(monitor) = self.admission else {
            return;
        };
        let started = Instant::now();
        while !monitor.available(0) {
            if self.is_cancelled() {
                return;
            }
            if started.elapsed() >= self.admission_max_wait {
                warn!("memory ceiling still exceeded after {:?}; proceeding", started.elapsed());
                return;
            }
            std::thread::sleep(ADMISSION_POLL);
        }
    }

    /// Runs one task to a result. Panics in the extractor are caught here.
    pub fn execute(&self, task: &Task) -> ConversionResult {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.convert(task)))
            .unwrap_or_else(|payload| {
                Err(TaskError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            });

        match outcome {
            Ok(degraded) => {
                info!(
                    event = "task_succeeded",
                    input = %task.input_path.display(),
                    degraded,
                    "converted {}",
                    task.input_path.display()
                );
                ConversionResult::succeeded(task, degraded)
            }
            Err(err) => {
                warn!(
                    event = "task_failed",
                    input = %task.input_path.display(),
                    kind = %err.kind(),
                    "failed to convert {}: {err}",
                    task.input_path.display()
                );
                ConversionResult::failed(task, &err)
            }
        }
    }

    /// Ok(degraded) when text was written.
    fn convert(&self, task: &Task) -> Result<bool, TaskError> {
        let Some(extractor) = self.registry.resolve(&task.input_path) else {
            return Err(TaskError::UnsupportedFormat {
                extension: extension_of(&task.input_path).unwrap_or_default(),
            });
        };

        if !task.input_path.is_file() {
            return Err(ExtractionError::InputMissing {
                path: task.input_path.clone(),
            }
            .into());
        }

        if let Some(parent) = task.output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TaskError::OutputWrite {
                path: task.output_path.clone(),
                source,
            })?;
        }

        let (text, degraded) = self.extract(extractor.as_ref(), task)?;
        let text = normalize_text(&self.postprocess, &text);
        if text.trim().is_empty() {
            return Err(ExtractionError::Empty.into());
        }

        std::fs::write(&task.output_path, text).map_err(|source| TaskError::OutputWrite {
            path: task.output_path.clone(),
            source,
        })?;
        Ok(degraded)
    }

    fn extract(
        &self,
        extractor: &dyn Extractor,
        task: &Task,
    ) -> Result<(String, bool), ExtractionError> {
        debug!(extractor = extractor.name(), input = %task.input_path.display(), "extracting");
        match extractor.extract(&task.input_path) {
            Ok(text) => Ok((text, false)),
            Err(ExtractionError::Degraded { text, cause })
                if self.degraded_policy == DegradedPolicy::Accept =>
            {
                warn!(
                    input = %task.input_path.display(),
                    "accepting degraded extraction: {cause}"
                );
                Ok((text, true))
            }
            Err(e) => Err(e),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
